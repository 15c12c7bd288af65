pub mod backend;
pub mod matrix_stack;
pub mod overlay;
pub mod primitive;
pub mod programs;
#[cfg(any(test, feature = "testing"))]
pub mod recording;
pub mod renderer;

pub use backend::*;
pub use matrix_stack::MatrixStack;
pub use overlay::*;
pub use primitive::*;
#[cfg(any(test, feature = "testing"))]
pub use recording::{GpuCall, RecordingBackend, RecordingOverlay};
pub use renderer::*;
