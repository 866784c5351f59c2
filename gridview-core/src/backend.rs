/// Graphics backend abstraction shared by the WebGL and software renderers
use nalgebra::Matrix4;
use std::fmt;

/// Pipeline stage a shader belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Primitive assembly mode for a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    #[default]
    Lines,
    Points,
}

/// The subset of a GL-style API the render pipeline drives.
///
/// Object creation returns `None` when the backend cannot allocate (lost
/// context, exhausted handles). Deleting consumes the handle.
pub trait GraphicsBackend {
    type Shader;
    type Program;
    type Buffer;
    type UniformLocation;

    fn create_shader(&mut self, stage: ShaderStage) -> Option<Self::Shader>;
    fn shader_source(&mut self, shader: &Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: &Self::Shader);
    fn compile_status(&self, shader: &Self::Shader) -> bool;
    fn shader_info_log(&self, shader: &Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Option<Self::Program>;
    fn attach_shader(&mut self, program: &Self::Program, shader: &Self::Shader);
    fn link_program(&mut self, program: &Self::Program);
    fn link_status(&self, program: &Self::Program) -> bool;
    fn program_info_log(&self, program: &Self::Program) -> String;
    fn use_program(&mut self, program: Option<&Self::Program>);
    fn delete_program(&mut self, program: Self::Program);

    fn attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32>;
    fn uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn uniform_matrix4(&mut self, location: &Self::UniformLocation, matrix: &Matrix4<f32>);

    fn create_buffer(&mut self) -> Option<Self::Buffer>;
    /// Bind `buffer` as the array buffer and fill it with write-once data
    fn upload_static(&mut self, buffer: &Self::Buffer, data: &[f32]);
    /// Source attribute `location` from `buffer`, `components` floats per vertex, tightly packed
    fn bind_vertex_attribute(&mut self, buffer: &Self::Buffer, location: u32, components: usize);
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    fn enable_depth_test(&mut self);
    fn viewport(&mut self, width: u32, height: u32);
    /// Clear colour and depth buffers
    fn clear(&mut self, color: [f32; 4]);
    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize);
}
