pub mod decode_queue;
pub mod fetch;
pub mod object_cache;
pub mod poll_gate;
pub mod protocol;
pub mod residency;
#[cfg(any(test, feature = "testing"))]
pub mod scripted_session;

pub use decode_queue::*;
pub use fetch::*;
pub use object_cache::*;
pub use poll_gate::*;
pub use protocol::*;
pub use residency::*;
#[cfg(any(test, feature = "testing"))]
pub use scripted_session::ScriptedSession;
