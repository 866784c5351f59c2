/// Software implementation of the graphics backend
///
/// Shaders are compiled by the GLSL subset parser; draws run the parsed
/// `gl_Position` expression on the CPU and rasterize into a [`Framebuffer`].
use nalgebra::{Matrix4, Vector4};

use gridview_core::{GraphicsBackend, Primitive, ShaderStage};

use crate::glsl::{self, GlslType, PositionExpr, ShaderModule, Storage};
use crate::renderer::{Framebuffer, ScreenVertex};

#[derive(Debug, PartialEq, Eq)]
pub struct ShaderHandle(usize);

#[derive(Debug, PartialEq, Eq)]
pub struct ProgramHandle(usize);

#[derive(Debug, PartialEq, Eq)]
pub struct BufferHandle(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformHandle {
    program: usize,
    index: usize,
}

struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: Option<Result<ShaderModule, String>>,
}

struct LinkedProgram {
    attributes: Vec<String>,
    uniforms: Vec<(String, GlslType)>,
    uniform_values: Vec<Matrix4<f32>>,
    position: PositionExpr,
    point_size: f32,
    color: [f32; 4],
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<usize>,
    linked: Option<Result<LinkedProgram, String>>,
}

#[derive(Debug, Clone, Copy)]
struct AttributeBinding {
    buffer: usize,
    location: u32,
    components: usize,
}

/// CPU backend drawing into a half-block character framebuffer
pub struct SoftwareBackend {
    framebuffer: Framebuffer,
    shaders: Vec<Option<ShaderObject>>,
    programs: Vec<Option<ProgramObject>>,
    buffers: Vec<Option<Vec<f32>>>,
    current_program: Option<usize>,
    binding: Option<AttributeBinding>,
    depth_test: bool,
    viewport: (u32, u32),
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            framebuffer: Framebuffer::new(width as usize, height as usize),
            shaders: Vec::new(),
            programs: Vec::new(),
            buffers: Vec::new(),
            current_program: None,
            binding: None,
            depth_test: false,
            viewport: (width, height),
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Resize the pixel grid backing the framebuffer
    pub fn resize(&mut self, width: u32, height: u32) {
        self.framebuffer.resize(width as usize, height as usize);
    }

    /// Number of live shader, program and buffer objects
    pub fn live_objects(&self) -> usize {
        self.shaders.iter().flatten().count()
            + self.programs.iter().flatten().count()
            + self.buffers.iter().flatten().count()
    }

    fn shader(&self, handle: &ShaderHandle) -> Option<&ShaderObject> {
        self.shaders.get(handle.0).and_then(Option::as_ref)
    }

    fn program(&self, handle: &ProgramHandle) -> Option<&ProgramObject> {
        self.programs.get(handle.0).and_then(Option::as_ref)
    }

    fn linked(&self, index: usize) -> Option<&LinkedProgram> {
        match self.programs.get(index)?.as_ref()?.linked.as_ref()? {
            Ok(linked) => Some(linked),
            Err(_) => None,
        }
    }

    fn link(&self, attached: &[usize]) -> Result<LinkedProgram, String> {
        let mut vertex = None;
        let mut fragment = None;
        for &index in attached {
            let Some(shader) = self.shaders.get(index).and_then(Option::as_ref) else {
                continue;
            };
            let module = match &shader.compiled {
                Some(Ok(module)) => module,
                _ => {
                    return Err(format!(
                        "ERROR: Attached {} shader is not compiled",
                        shader.stage
                    ));
                }
            };
            let slot = match shader.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.replace(module).is_some() {
                return Err(format!("ERROR: Multiple {} shaders attached", shader.stage));
            }
        }

        let vertex: &ShaderModule = vertex.ok_or("ERROR: Missing vertex shader")?;
        let fragment: &ShaderModule = fragment.ok_or("ERROR: Missing fragment shader")?;

        let mut uniforms: Vec<(String, GlslType)> = Vec::new();
        for decl in vertex
            .declared(Storage::Uniform)
            .chain(fragment.declared(Storage::Uniform))
        {
            match uniforms.iter().find(|(name, _)| *name == decl.name) {
                Some((_, ty)) if *ty != decl.ty => {
                    return Err(format!(
                        "ERROR: Uniform '{}' declared with different types",
                        decl.name
                    ));
                }
                Some(_) => {}
                None => uniforms.push((decl.name.clone(), decl.ty)),
            }
        }

        for varying in fragment.declared(Storage::Varying) {
            if !vertex
                .declared(Storage::Varying)
                .any(|v| v.name == varying.name && v.ty == varying.ty)
            {
                return Err(format!(
                    "ERROR: Varying '{}' not written by vertex shader",
                    varying.name
                ));
            }
        }

        let position = vertex
            .position
            .clone()
            .ok_or("ERROR: vertex shader does not write gl_Position")?;

        Ok(LinkedProgram {
            attributes: vertex
                .declared(Storage::Attribute)
                .map(|d| d.name.clone())
                .collect(),
            uniform_values: vec![Matrix4::zeros(); uniforms.len()],
            uniforms,
            position,
            point_size: vertex.point_size.unwrap_or(1.0),
            color: fragment.frag_color.unwrap_or([0.0, 0.0, 0.0, 1.0]),
        })
    }

    /// Run the vertex stage for `count` vertices starting at `first`
    fn transform_vertices(&self, program: &LinkedProgram, first: usize, count: usize) -> Vec<Option<ScreenVertex>> {
        let Some(location) = program
            .attributes
            .iter()
            .position(|a| *a == program.position.attribute)
        else {
            return Vec::new();
        };
        let Some(binding) = self.binding.filter(|b| b.location as usize == location) else {
            tracing::warn!(attribute = %program.position.attribute, "draw with no bound vertex attribute");
            return Vec::new();
        };
        let Some(data) = self.buffers.get(binding.buffer).and_then(Option::as_ref) else {
            return Vec::new();
        };

        let mut mvp = Matrix4::identity();
        for name in &program.position.matrices {
            let value = program
                .uniforms
                .iter()
                .position(|(n, _)| n == name)
                .map(|i| program.uniform_values[i])
                .unwrap_or_else(Matrix4::zeros);
            mvp *= value;
        }

        let (vw, vh) = (self.viewport.0 as f32, self.viewport.1 as f32);
        data.chunks_exact(binding.components)
            .skip(first)
            .take(count)
            .map(|v| {
                let component = |i: usize| v.get(i).copied().unwrap_or(0.0);
                let clip = mvp
                    * Vector4::new(component(0), component(1), component(2), program.position.w);
                if clip.w <= 1e-6 {
                    return None;
                }
                let ndc = clip.xyz() / clip.w;
                Some(ScreenVertex {
                    x: (ndc.x + 1.0) * 0.5 * vw,
                    y: (1.0 - ndc.y) * 0.5 * vh,
                    depth: (ndc.z + 1.0) * 0.5,
                })
            })
            .collect()
    }
}

impl GraphicsBackend for SoftwareBackend {
    type Shader = ShaderHandle;
    type Program = ProgramHandle;
    type Buffer = BufferHandle;
    type UniformLocation = UniformHandle;

    fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderHandle> {
        self.shaders.push(Some(ShaderObject {
            stage,
            source: String::new(),
            compiled: None,
        }));
        Some(ShaderHandle(self.shaders.len() - 1))
    }

    fn shader_source(&mut self, shader: &ShaderHandle, source: &str) {
        if let Some(Some(object)) = self.shaders.get_mut(shader.0) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: &ShaderHandle) {
        if let Some(Some(object)) = self.shaders.get_mut(shader.0) {
            object.compiled = Some(glsl::compile(object.stage, &object.source));
        }
    }

    fn compile_status(&self, shader: &ShaderHandle) -> bool {
        matches!(
            self.shader(shader).and_then(|s| s.compiled.as_ref()),
            Some(Ok(_))
        )
    }

    fn shader_info_log(&self, shader: &ShaderHandle) -> String {
        match self.shader(shader).and_then(|s| s.compiled.as_ref()) {
            Some(Err(log)) => log.clone(),
            _ => String::new(),
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if let Some(slot) = self.shaders.get_mut(shader.0) {
            *slot = None;
        }
    }

    fn create_program(&mut self) -> Option<ProgramHandle> {
        self.programs.push(Some(ProgramObject::default()));
        Some(ProgramHandle(self.programs.len() - 1))
    }

    fn attach_shader(&mut self, program: &ProgramHandle, shader: &ShaderHandle) {
        if let Some(Some(object)) = self.programs.get_mut(program.0) {
            if !object.attached.contains(&shader.0) {
                object.attached.push(shader.0);
            }
        }
    }

    fn link_program(&mut self, program: &ProgramHandle) {
        let Some(object) = self.program(program) else {
            return;
        };
        let result = self.link(&object.attached);
        if let Some(Some(object)) = self.programs.get_mut(program.0) {
            object.linked = Some(result);
        }
    }

    fn link_status(&self, program: &ProgramHandle) -> bool {
        matches!(
            self.program(program).and_then(|p| p.linked.as_ref()),
            Some(Ok(_))
        )
    }

    fn program_info_log(&self, program: &ProgramHandle) -> String {
        match self.program(program).and_then(|p| p.linked.as_ref()) {
            Some(Err(log)) => log.clone(),
            _ => String::new(),
        }
    }

    fn use_program(&mut self, program: Option<&ProgramHandle>) {
        self.current_program = program.map(|p| p.0);
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.current_program == Some(program.0) {
            self.current_program = None;
        }
        if let Some(slot) = self.programs.get_mut(program.0) {
            *slot = None;
        }
    }

    fn attrib_location(&self, program: &ProgramHandle, name: &str) -> Option<u32> {
        self.linked(program.0)?
            .attributes
            .iter()
            .position(|a| a == name)
            .map(|i| i as u32)
    }

    fn uniform_location(&self, program: &ProgramHandle, name: &str) -> Option<UniformHandle> {
        let index = self
            .linked(program.0)?
            .uniforms
            .iter()
            .position(|(n, _)| n == name)?;
        Some(UniformHandle {
            program: program.0,
            index,
        })
    }

    fn uniform_matrix4(&mut self, location: &UniformHandle, matrix: &Matrix4<f32>) {
        if self.current_program != Some(location.program) {
            tracing::warn!("uniform set on a program that is not in use");
            return;
        }
        if let Some(Some(ProgramObject {
            linked: Some(Ok(linked)),
            ..
        })) = self.programs.get_mut(location.program)
        {
            if let Some(value) = linked.uniform_values.get_mut(location.index) {
                *value = *matrix;
            }
        }
    }

    fn create_buffer(&mut self) -> Option<BufferHandle> {
        self.buffers.push(Some(Vec::new()));
        Some(BufferHandle(self.buffers.len() - 1))
    }

    fn upload_static(&mut self, buffer: &BufferHandle, data: &[f32]) {
        if let Some(Some(storage)) = self.buffers.get_mut(buffer.0) {
            *storage = data.to_vec();
        }
    }

    fn bind_vertex_attribute(&mut self, buffer: &BufferHandle, location: u32, components: usize) {
        self.binding = Some(AttributeBinding {
            buffer: buffer.0,
            location,
            components: components.max(1),
        });
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.binding.map_or(false, |b| b.buffer == buffer.0) {
            self.binding = None;
        }
        if let Some(slot) = self.buffers.get_mut(buffer.0) {
            *slot = None;
        }
    }

    fn enable_depth_test(&mut self) {
        self.depth_test = true;
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.framebuffer.clear(color);
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: usize, count: usize) {
        let Some(program) = self.current_program.and_then(|p| self.linked(p)) else {
            tracing::warn!("draw with no linked program in use");
            return;
        };
        let vertices = self.transform_vertices(program, first, count);
        let (color, point_size) = (program.color, program.point_size);
        let depth_test = self.depth_test;

        match primitive {
            Primitive::Points => {
                for v in vertices.into_iter().flatten() {
                    self.framebuffer.draw_point(v, point_size, color, depth_test);
                }
            }
            Primitive::Lines => {
                for pair in vertices.chunks_exact(2) {
                    if let (Some(a), Some(b)) = (pair[0], pair[1]) {
                        self.framebuffer.draw_line(a, b, color, depth_test);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridview_core::shader::{FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE};
    use gridview_core::{
        link_program, CancelToken, GeometryMode, Point, RenderError, RenderSession,
        SessionConfig, SurfaceSize, TickOutcome,
    };

    const FLAT_VERTEX: &str = "attribute vec3 coordinates;\nvoid main() { gl_Position = vec4(coordinates, 1.0); gl_PointSize = 1.0; }";

    #[test]
    fn test_compile_error_log() {
        let mut gl = SoftwareBackend::new(10, 10);
        let result = link_program(&mut gl, "void main() { gl_Position = m * vec4(p, 1.0); }", FRAGMENT_SHADER_SOURCE);
        match result {
            Err(RenderError::ShaderCompile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert_eq!(log, "ERROR: 'm' : undeclared identifier");
            }
            other => panic!("expected compile error, got {:?}", other.map(|_| ())),
        }
        // The rejected shader and its compiled partner are both gone
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn test_link_checks_uniform_types() {
        let mut gl = SoftwareBackend::new(10, 10);
        let fragment = "precision mediump float;\nuniform vec4 modelViewMatrix;\nvoid main() { gl_FragColor = vec4(1.0, 1.0, 1.0, 1.0); }";
        let result = link_program(&mut gl, VERTEX_SHADER_SOURCE, fragment);
        match result {
            Err(RenderError::ProgramLink { log }) => assert!(log.contains("different types")),
            other => panic!("expected link error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn test_attribute_and_uniform_locations() {
        let mut gl = SoftwareBackend::new(10, 10);
        let program = link_program(&mut gl, VERTEX_SHADER_SOURCE, FRAGMENT_SHADER_SOURCE).unwrap();
        assert_eq!(gl.attrib_location(program.handle(), "coordinates"), Some(0));
        assert_eq!(gl.attrib_location(program.handle(), "normal"), None);
        assert!(gl.uniform_location(program.handle(), "projectionMatrix").is_some());
        assert!(gl.uniform_location(program.handle(), "viewMatrix").is_none());

        program.dispose(&mut gl);
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn test_draw_points_in_clip_space() {
        let mut gl = SoftwareBackend::new(10, 10);
        let program = link_program(&mut gl, FLAT_VERTEX, FRAGMENT_SHADER_SOURCE).unwrap();
        program.bind(&mut gl);

        let buffer = gl.create_buffer().unwrap();
        gl.upload_static(&buffer, &[0.0, 0.0, 0.0, 0.9, 0.9, 0.0]);
        gl.bind_vertex_attribute(&buffer, 0, 3);
        gl.clear([0.0, 0.0, 0.0, 1.0]);
        gl.draw_arrays(Primitive::Points, 0, 2);

        let fb = gl.framebuffer();
        // The origin lands on a pixel corner; the pixel up-left of it owns the centre
        assert_eq!(fb.pixel(4, 4), Some([0, 255, 0]));
        assert_eq!(fb.pixel(9, 0), Some([0, 255, 0]));
        assert_eq!(fb.lit_pixels(), 2);
    }

    #[test]
    fn test_draw_lines_pairs_vertices() {
        let mut gl = SoftwareBackend::new(10, 10);
        let program = link_program(&mut gl, FLAT_VERTEX, FRAGMENT_SHADER_SOURCE).unwrap();
        program.bind(&mut gl);

        let buffer = gl.create_buffer().unwrap();
        // One horizontal segment plus a dangling vertex that GL ignores
        gl.upload_static(&buffer, &[-0.9, 0.0, 0.0, 0.9, 0.0, 0.0, 0.0, 0.9, 0.0]);
        gl.bind_vertex_attribute(&buffer, 0, 3);
        gl.clear([0.0, 0.0, 0.0, 1.0]);
        gl.draw_arrays(Primitive::Lines, 0, 3);

        let fb = gl.framebuffer();
        for x in 0..=9 {
            assert_eq!(fb.pixel(x, 5), Some([0, 255, 0]), "x = {x}");
        }
        assert_eq!(fb.pixel(5, 0), None);
    }

    #[test]
    fn test_session_renders_grid() {
        let mut gl = SoftwareBackend::new(80, 48);
        let surface = SurfaceSize::new(80, 48);
        let points = [Point::new(-1.0, -1.0, 0.0), Point::new(1.0, 1.0, 0.0)];
        let mut session = RenderSession::begin(&mut gl, SessionConfig::default(), surface)
            .unwrap()
            .attach_geometry(&mut gl, &points)
            .unwrap();
        assert_eq!(session.vertex_count(), 12);

        let cancel = CancelToken::new();
        assert_eq!(session.tick(&mut gl, &cancel), TickOutcome::Continue);
        assert!(gl.framebuffer().lit_pixels() > 0);

        cancel.cancel();
        assert_eq!(session.tick(&mut gl, &cancel), TickOutcome::Stop);
        session.dispose(&mut gl);
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn test_session_points_mode() {
        let mut gl = SoftwareBackend::new(40, 40);
        let config = SessionConfig {
            geometry: GeometryMode::Direct,
            primitive: Primitive::Points,
            ..SessionConfig::default()
        };
        let mut session = RenderSession::begin(&mut gl, config, SurfaceSize::new(40, 40))
            .unwrap()
            .attach_geometry(&mut gl, &[Point::new(0.0, 0.0, 0.0)])
            .unwrap();
        session.tick(&mut gl, &CancelToken::new());
        // A single 3px point at the centre of the surface
        assert_eq!(gl.framebuffer().lit_pixels(), 9);
        assert!(gl.framebuffer().pixel(20, 20).is_some());
    }
}
