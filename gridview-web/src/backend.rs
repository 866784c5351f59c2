/// WebGL 1 implementation of the graphics backend
use nalgebra::Matrix4;
use wasm_bindgen::JsCast;
use web_sys::{
    HtmlCanvasElement, WebGlBuffer, WebGlProgram, WebGlRenderingContext as GL, WebGlShader,
    WebGlUniformLocation,
};

use gridview_core::{GraphicsBackend, Primitive, RenderError, ShaderStage};

/// Thin wrapper over a canvas' `webgl` context
pub struct WebGlBackend {
    gl: GL,
}

impl WebGlBackend {
    /// Obtain the `webgl` context of `canvas`
    pub fn from_canvas(canvas: &HtmlCanvasElement) -> Result<Self, RenderError> {
        let context = canvas
            .get_context("webgl")
            .map_err(|e| RenderError::ContextUnavailable(format!("{e:?}")))?
            .ok_or_else(|| RenderError::ContextUnavailable("WebGL not supported".to_string()))?;
        let gl = context
            .dyn_into::<GL>()
            .map_err(|_| RenderError::ContextUnavailable("context is not WebGL".to_string()))?;
        Ok(Self { gl })
    }
}

impl GraphicsBackend for WebGlBackend {
    type Shader = WebGlShader;
    type Program = WebGlProgram;
    type Buffer = WebGlBuffer;
    type UniformLocation = WebGlUniformLocation;

    fn create_shader(&mut self, stage: ShaderStage) -> Option<WebGlShader> {
        let kind = match stage {
            ShaderStage::Vertex => GL::VERTEX_SHADER,
            ShaderStage::Fragment => GL::FRAGMENT_SHADER,
        };
        self.gl.create_shader(kind)
    }

    fn shader_source(&mut self, shader: &WebGlShader, source: &str) {
        self.gl.shader_source(shader, source);
    }

    fn compile_shader(&mut self, shader: &WebGlShader) {
        self.gl.compile_shader(shader);
    }

    fn compile_status(&self, shader: &WebGlShader) -> bool {
        self.gl
            .get_shader_parameter(shader, GL::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: &WebGlShader) -> String {
        self.gl.get_shader_info_log(shader).unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: WebGlShader) {
        self.gl.delete_shader(Some(&shader));
    }

    fn create_program(&mut self) -> Option<WebGlProgram> {
        self.gl.create_program()
    }

    fn attach_shader(&mut self, program: &WebGlProgram, shader: &WebGlShader) {
        self.gl.attach_shader(program, shader);
    }

    fn link_program(&mut self, program: &WebGlProgram) {
        self.gl.link_program(program);
    }

    fn link_status(&self, program: &WebGlProgram) -> bool {
        self.gl
            .get_program_parameter(program, GL::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: &WebGlProgram) -> String {
        self.gl.get_program_info_log(program).unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<&WebGlProgram>) {
        self.gl.use_program(program);
    }

    fn delete_program(&mut self, program: WebGlProgram) {
        self.gl.delete_program(Some(&program));
    }

    fn attrib_location(&self, program: &WebGlProgram, name: &str) -> Option<u32> {
        // -1 when the attribute is absent or optimized out
        u32::try_from(self.gl.get_attrib_location(program, name)).ok()
    }

    fn uniform_location(&self, program: &WebGlProgram, name: &str) -> Option<WebGlUniformLocation> {
        self.gl.get_uniform_location(program, name)
    }

    fn uniform_matrix4(&mut self, location: &WebGlUniformLocation, matrix: &Matrix4<f32>) {
        // nalgebra storage is column-major, as WebGL expects with transpose = false
        self.gl
            .uniform_matrix4fv_with_f32_array(Some(location), false, matrix.as_slice());
    }

    fn create_buffer(&mut self) -> Option<WebGlBuffer> {
        self.gl.create_buffer()
    }

    fn upload_static(&mut self, buffer: &WebGlBuffer, data: &[f32]) {
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(buffer));
        // The view aliases wasm memory; nothing may allocate before buffer_data copies it
        unsafe {
            let view = js_sys::Float32Array::view(data);
            self.gl
                .buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &view, GL::STATIC_DRAW);
        }
    }

    fn bind_vertex_attribute(&mut self, buffer: &WebGlBuffer, location: u32, components: usize) {
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(buffer));
        self.gl.vertex_attrib_pointer_with_i32(
            location,
            components as i32,
            GL::FLOAT,
            false,
            0,
            0,
        );
        self.gl.enable_vertex_attrib_array(location);
    }

    fn delete_buffer(&mut self, buffer: WebGlBuffer) {
        self.gl.delete_buffer(Some(&buffer));
    }

    fn enable_depth_test(&mut self) {
        self.gl.enable(GL::DEPTH_TEST);
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.gl.viewport(0, 0, width as i32, height as i32);
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color;
        self.gl.clear_color(r, g, b, a);
        self.gl.clear(GL::COLOR_BUFFER_BIT | GL::DEPTH_BUFFER_BIT);
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize) {
        let mode = match primitive {
            Primitive::Lines => GL::LINES,
            Primitive::Points => GL::POINTS,
        };
        self.gl.draw_arrays(mode, first as i32, count as i32);
    }
}
