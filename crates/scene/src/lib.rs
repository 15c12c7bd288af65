pub mod camera;
pub mod interaction;
pub mod scene_graph;

pub use camera::*;
pub use interaction::*;
pub use scene_graph::*;
