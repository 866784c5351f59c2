/// gridview core library - backend-agnostic render pipeline
///
/// Shader compilation and linking, point loading, vertex sequence
/// construction, camera/rotation transforms, and the render session that
/// ties them together. Rendering backends implement [`GraphicsBackend`].

pub mod backend;
pub mod buffer;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod projection;
pub mod session;
pub mod shader;
pub mod transform;

// Re-export commonly used types
pub use backend::{GraphicsBackend, Primitive, ShaderStage};
pub use buffer::VertexBuffer;
pub use config::SessionConfig;
pub use error::{LoadError, RenderError};
pub use geometry::{Bounds, GeometryMode, Point, VertexSequence};
pub use projection::{Camera, SurfaceSize};
pub use session::{CancelToken, RenderSession, SessionSetup, TickOutcome};
pub use shader::{compile_shader, link_program, ShaderProgram};
pub use transform::{RotationAxes, RotationState, Transform};
