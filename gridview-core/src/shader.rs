/// Shader compilation and program linking
use crate::backend::{GraphicsBackend, ShaderStage};
use crate::error::RenderError;

/// Default vertex stage: transforms `coordinates` by the two matrix uniforms
pub const VERTEX_SHADER_SOURCE: &str = r#"
attribute vec3 coordinates;
uniform mat4 modelViewMatrix;
uniform mat4 projectionMatrix;
void main(void) {
    gl_Position = projectionMatrix * modelViewMatrix * vec4(coordinates, 1.0);
    gl_PointSize = 3.0;
}
"#;

/// Default fragment stage: flat green
pub const FRAGMENT_SHADER_SOURCE: &str = r#"
precision mediump float;
void main(void) {
    gl_FragColor = vec4(0.0, 1.0, 0.0, 1.0);
}
"#;

/// Name of the per-vertex position attribute
pub const COORDINATES_ATTRIBUTE: &str = "coordinates";
pub const MODEL_VIEW_UNIFORM: &str = "modelViewMatrix";
pub const PROJECTION_UNIFORM: &str = "projectionMatrix";

/// Compile one shader stage.
///
/// The shader object is deleted before returning an error, so a failed
/// compile never leaks a backend handle.
pub fn compile_shader<B: GraphicsBackend>(
    gl: &mut B,
    stage: ShaderStage,
    source: &str,
) -> Result<B::Shader, RenderError> {
    let shader = gl
        .create_shader(stage)
        .ok_or(RenderError::Allocation("shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);

    if !gl.compile_status(&shader) {
        let log = gl.shader_info_log(&shader);
        tracing::error!(%stage, %log, "shader compile error");
        gl.delete_shader(shader);
        return Err(RenderError::ShaderCompile { stage, log });
    }

    tracing::debug!(%stage, "shader compiled");
    Ok(shader)
}

/// A linked vertex + fragment program together with the shaders it owns
pub struct ShaderProgram<B: GraphicsBackend> {
    program: B::Program,
    vertex: B::Shader,
    fragment: B::Shader,
}

impl<B: GraphicsBackend> ShaderProgram<B> {
    pub fn handle(&self) -> &B::Program {
        &self.program
    }

    /// Make this the active program
    pub fn bind(&self, gl: &mut B) {
        gl.use_program(Some(&self.program));
    }

    /// Release the program and both shader objects
    pub fn dispose(self, gl: &mut B) {
        gl.use_program(None);
        gl.delete_program(self.program);
        gl.delete_shader(self.vertex);
        gl.delete_shader(self.fragment);
    }
}

/// Compile both stages and link them.
///
/// Linking is only attempted once both stages compiled; a stage that did
/// compile is released when its partner fails.
pub fn link_program<B: GraphicsBackend>(
    gl: &mut B,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ShaderProgram<B>, RenderError> {
    let vertex = compile_shader(gl, ShaderStage::Vertex, vertex_source);
    let fragment = compile_shader(gl, ShaderStage::Fragment, fragment_source);

    let (vertex, fragment) = match (vertex, fragment) {
        (Ok(vertex), Ok(fragment)) => (vertex, fragment),
        (Ok(vertex), Err(e)) => {
            gl.delete_shader(vertex);
            return Err(e);
        }
        (Err(e), Ok(fragment)) => {
            gl.delete_shader(fragment);
            return Err(e);
        }
        (Err(e), Err(_)) => return Err(e),
    };

    let Some(program) = gl.create_program() else {
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);
        return Err(RenderError::Allocation("program"));
    };
    gl.attach_shader(&program, &vertex);
    gl.attach_shader(&program, &fragment);
    gl.link_program(&program);

    if !gl.link_status(&program) {
        let log = gl.program_info_log(&program);
        tracing::error!(%log, "program link error");
        gl.delete_program(program);
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);
        return Err(RenderError::ProgramLink { log });
    }

    tracing::debug!("program linked");
    Ok(ShaderProgram {
        program,
        vertex,
        fragment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};

    #[test]
    fn test_compile_failure_deletes_shader() {
        let mut gl = RecordingBackend::new();
        gl.fail_vertex = true;

        let result = compile_shader(&mut gl, ShaderStage::Vertex, "void main() {}");
        match result {
            Err(RenderError::ShaderCompile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(log.contains("rejected"));
            }
            other => panic!("expected compile error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(gl.count(|c| matches!(c, Call::DeleteShader(_))), 1);
    }

    #[test]
    fn test_link_success() {
        let mut gl = RecordingBackend::new();
        let program = link_program(&mut gl, VERTEX_SHADER_SOURCE, FRAGMENT_SHADER_SOURCE)
            .expect("link should succeed");

        assert_eq!(gl.count(|c| matches!(c, Call::AttachShader(..))), 2);
        assert_eq!(gl.count(|c| matches!(c, Call::LinkProgram(_))), 1);
        assert_eq!(gl.count(|c| matches!(c, Call::DeleteShader(_))), 0);

        program.dispose(&mut gl);
        assert_eq!(gl.count(|c| matches!(c, Call::DeleteProgram(_))), 1);
        assert_eq!(gl.count(|c| matches!(c, Call::DeleteShader(_))), 2);
    }

    #[test]
    fn test_failed_stage_prevents_link() {
        let mut gl = RecordingBackend::new();
        gl.fail_fragment = true;

        let result = link_program(&mut gl, VERTEX_SHADER_SOURCE, "broken");
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            })
        ));
        assert_eq!(gl.count(|c| matches!(c, Call::CreateProgram(_))), 0);
        assert_eq!(gl.count(|c| matches!(c, Call::LinkProgram(_))), 0);
        // Both the failed fragment shader and the compiled vertex shader are released
        assert_eq!(gl.count(|c| matches!(c, Call::DeleteShader(_))), 2);
    }

    #[test]
    fn test_vertex_error_reported_first() {
        let mut gl = RecordingBackend::new();
        gl.fail_vertex = true;
        gl.fail_fragment = true;

        let result = link_program(&mut gl, "a", "b");
        assert!(matches!(
            result,
            Err(RenderError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            })
        ));
    }

    #[test]
    fn test_link_failure_releases_everything() {
        let mut gl = RecordingBackend::new();
        gl.fail_link = true;

        let result = link_program(&mut gl, VERTEX_SHADER_SOURCE, FRAGMENT_SHADER_SOURCE);
        match result {
            Err(RenderError::ProgramLink { log }) => assert!(log.contains("varying")),
            other => panic!("expected link error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(gl.count(|c| matches!(c, Call::DeleteProgram(_))), 1);
        assert_eq!(gl.count(|c| matches!(c, Call::DeleteShader(_))), 2);
    }

    #[test]
    fn test_allocation_failure() {
        let mut gl = RecordingBackend::new();
        gl.fail_allocation = true;

        let result = compile_shader(&mut gl, ShaderStage::Vertex, VERTEX_SHADER_SOURCE);
        assert!(matches!(result, Err(RenderError::Allocation("shader"))));
    }
}
