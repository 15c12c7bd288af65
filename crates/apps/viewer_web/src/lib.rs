pub mod config;
pub mod viewer;

#[cfg(target_arch = "wasm32")]
mod canvas_overlay;
#[cfg(target_arch = "wasm32")]
mod host;
#[cfg(target_arch = "wasm32")]
mod js_session;
mod wgpu;

pub use config::{ConfigError, ViewerConfig};
pub use viewer::{
    HostEvent, HostMouseAction, TickReport, UNSUPPORTED_MESSAGE, Viewer, ViewerError, ViewerStats,
    ViewerStatus,
};
