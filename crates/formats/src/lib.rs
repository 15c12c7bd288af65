pub mod payload;
pub mod primitive;
pub mod scene_descriptor;
pub mod wire;
pub mod wire_writer;

pub use payload::*;
pub use primitive::*;
pub use scene_descriptor::*;
pub use wire::{MalformedPayload, WireError, decode};
pub use wire_writer::WireWriter;
