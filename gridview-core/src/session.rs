/// Render session: one-time setup followed by per-frame ticks
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::GraphicsBackend;
use crate::buffer::VertexBuffer;
use crate::config::SessionConfig;
use crate::error::RenderError;
use crate::geometry::{Point, VertexSequence};
use crate::projection::{Camera, SurfaceSize};
use crate::shader::{
    link_program, ShaderProgram, COORDINATES_ATTRIBUTE, MODEL_VIEW_UNIFORM, PROJECTION_UNIFORM,
};
use crate::transform::{RotationState, Transform};

/// Shared flag an outside driver sets to stop a running session
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What the driver should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Program linked and bound, waiting for geometry
pub struct SessionSetup<B: GraphicsBackend> {
    config: SessionConfig,
    program: ShaderProgram<B>,
    camera: Camera,
}

/// A set-up pipeline ticked once per frame until stopped
pub struct RenderSession<B: GraphicsBackend> {
    config: SessionConfig,
    program: ShaderProgram<B>,
    buffer: VertexBuffer<B>,
    model_view_location: Option<B::UniformLocation>,
    projection_location: Option<B::UniformLocation>,
    camera: Camera,
    rotation: RotationState,
    frames: u64,
    stopped: bool,
}

impl<B: GraphicsBackend> RenderSession<B> {
    /// Link the configured shaders and prepare fixed pipeline state
    pub fn begin(
        gl: &mut B,
        config: SessionConfig,
        surface: SurfaceSize,
    ) -> Result<SessionSetup<B>, RenderError> {
        config.validate()?;

        let program = link_program(gl, &config.vertex_shader, &config.fragment_shader)?;
        gl.enable_depth_test();
        program.bind(gl);
        gl.viewport(surface.width, surface.height);

        let mut camera = Camera::new(surface.width, surface.height)
            .with_distance(config.camera_distance);
        camera.fov = config.field_of_view;
        camera.near = config.near;
        camera.far = config.far;

        tracing::info!(?surface, "render program ready");
        Ok(SessionSetup {
            config,
            program,
            camera,
        })
    }

    /// Advance one frame.
    ///
    /// A cancelled or stopped session returns `Stop` without touching the backend.
    pub fn tick(&mut self, gl: &mut B, cancel: &CancelToken) -> TickOutcome {
        if self.stopped || cancel.is_cancelled() {
            if !self.stopped {
                tracing::info!(frames = self.frames, "render session cancelled");
            }
            self.stopped = true;
            return TickOutcome::Stop;
        }

        self.rotation
            .advance(self.config.rotation_axes, self.config.rotation_step);
        let model_view =
            Transform::model_view(&self.camera, &self.rotation, self.config.rotation_axes);
        let projection = self.camera.projection_matrix();

        if let Some(location) = &self.model_view_location {
            gl.uniform_matrix4(location, &model_view);
        }
        if let Some(location) = &self.projection_location {
            gl.uniform_matrix4(location, &projection);
        }

        gl.clear(self.config.clear_color);
        let count = self.buffer.vertex_count();
        if count > 0 {
            gl.draw_arrays(self.config.primitive, 0, count);
        }

        self.frames += 1;
        TickOutcome::Continue
    }

    /// Recompute the projection for a new surface size
    pub fn resize(&mut self, gl: &mut B, surface: SurfaceSize) {
        if self.camera.set_surface(surface) {
            tracing::debug!(?surface, aspect = self.camera.aspect, "surface resized");
        }
        if surface.height > 0 {
            gl.viewport(surface.width, surface.height);
        }
    }

    /// Release the buffer, program and shaders
    pub fn dispose(self, gl: &mut B) {
        self.buffer.dispose(gl);
        self.program.dispose(gl);
        tracing::debug!(frames = self.frames, "render session disposed");
    }

    pub fn rotation(&self) -> RotationState {
        self.rotation
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn vertex_count(&self) -> usize {
        self.buffer.vertex_count()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl<B: GraphicsBackend> SessionSetup<B> {
    /// Build and upload the vertex sequence, then wire up attribute and uniforms
    pub fn attach_geometry(
        self,
        gl: &mut B,
        points: &[Point],
    ) -> Result<RenderSession<B>, RenderError> {
        let vertices = match VertexSequence::build(self.config.geometry, points) {
            Ok(vertices) => vertices,
            Err(e) => {
                self.abort(gl);
                return Err(e);
            }
        };

        let buffer = match VertexBuffer::upload(gl, &vertices) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.abort(gl);
                return Err(e);
            }
        };
        if let Err(e) = buffer.bind_attribute(gl, self.program.handle(), COORDINATES_ATTRIBUTE) {
            buffer.dispose(gl);
            self.abort(gl);
            return Err(e);
        }

        let model_view_location = gl.uniform_location(self.program.handle(), MODEL_VIEW_UNIFORM);
        let projection_location = gl.uniform_location(self.program.handle(), PROJECTION_UNIFORM);
        if model_view_location.is_none() {
            tracing::debug!("program has no {MODEL_VIEW_UNIFORM} uniform");
        }
        if projection_location.is_none() {
            tracing::debug!("program has no {PROJECTION_UNIFORM} uniform");
        }
        if let Some(location) = &projection_location {
            gl.uniform_matrix4(location, &self.camera.projection_matrix());
        }

        tracing::info!(
            points = points.len(),
            vertices = vertices.vertex_count(),
            geometry = ?self.config.geometry,
            "geometry attached"
        );

        Ok(RenderSession {
            config: self.config,
            program: self.program,
            buffer,
            model_view_location,
            projection_location,
            camera: self.camera,
            rotation: RotationState::zero(),
            frames: 0,
            stopped: false,
        })
    }

    /// Give up before rendering, releasing the linked program
    pub fn abort(self, gl: &mut B) {
        self.program.dispose(gl);
        tracing::debug!("render setup aborted");
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
