/// Static vertex buffers
use crate::backend::GraphicsBackend;
use crate::error::RenderError;
use crate::geometry::VertexSequence;

/// A write-once buffer of `vec3` positions resident on the backend
pub struct VertexBuffer<B: GraphicsBackend> {
    buffer: B::Buffer,
    vertex_count: usize,
}

impl<B: GraphicsBackend> VertexBuffer<B> {
    pub fn upload(gl: &mut B, vertices: &VertexSequence) -> Result<Self, RenderError> {
        let buffer = gl
            .create_buffer()
            .ok_or(RenderError::Allocation("vertex buffer"))?;
        gl.upload_static(&buffer, vertices.as_slice());
        tracing::debug!(vertices = vertices.vertex_count(), "uploaded vertex buffer");

        Ok(Self {
            buffer,
            vertex_count: vertices.vertex_count(),
        })
    }

    /// Feed the named `vec3` attribute of `program` from this buffer
    pub fn bind_attribute(
        &self,
        gl: &mut B,
        program: &B::Program,
        name: &str,
    ) -> Result<(), RenderError> {
        let location = gl
            .attrib_location(program, name)
            .ok_or_else(|| RenderError::MissingAttribute(name.to_string()))?;
        gl.bind_vertex_attribute(&self.buffer, location, 3);
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn dispose(self, gl: &mut B) {
        gl.delete_buffer(self.buffer);
    }
}
