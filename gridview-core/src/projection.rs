/// Camera and projection utilities
use nalgebra::{Matrix4, Point3, Vector3};

/// Drawable surface dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `None` when the surface has collapsed to zero height
    pub fn aspect(&self) -> Option<f32> {
        (self.height > 0).then(|| self.width as f32 / self.height as f32)
    }
}

/// Fixed perspective camera looking down -Z at the origin
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 6.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: std::f32::consts::PI / 4.0, // 45 degrees
            aspect: SurfaceSize::new(width, height).aspect().unwrap_or(1.0),
            near: 0.1,
            far: 100.0,
        }
    }

    /// Move the eye along +Z, keeping it aimed at the origin
    pub fn with_distance(mut self, distance: f32) -> Self {
        self.position = Point3::new(0.0, 0.0, distance);
        self
    }

    /// Recompute the aspect ratio for a resized surface.
    ///
    /// Returns whether the aspect changed; zero-height surfaces are ignored.
    pub fn set_surface(&mut self, size: SurfaceSize) -> bool {
        match size.aspect() {
            Some(aspect) if (aspect - self.aspect).abs() > f32::EPSILON => {
                self.aspect = aspect;
                true
            }
            Some(_) => false,
            None => {
                tracing::warn!(?size, "ignoring zero-height surface");
                false
            }
        }
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Create the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(800, 600);
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert!((camera.fov - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert_eq!(camera.near, 0.1);
        assert_eq!(camera.far, 100.0);
    }

    #[test]
    fn test_view_matrix() {
        let camera = Camera::new(800, 600);
        let view = camera.view_matrix();
        let expected = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -6.0));
        assert!((view - expected).norm() < 1e-5);
    }

    #[test]
    fn test_projection_matrix() {
        let camera = Camera::new(400, 200);
        let p = camera.projection_matrix();
        let f = 1.0 / (std::f32::consts::FRAC_PI_8).tan();
        assert!((p[(0, 0)] - f / 2.0).abs() < 1e-5);
        assert!((p[(1, 1)] - f).abs() < 1e-5);
        assert!((p[(3, 2)] + 1.0).abs() < 1e-6);
        // Near plane maps to -1, far plane to +1 in NDC
        let near = p.transform_point(&Point3::new(0.0, 0.0, -0.1));
        let far = p.transform_point(&Point3::new(0.0, 0.0, -100.0));
        assert!((near.z + 1.0).abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut camera = Camera::new(800, 600);
        assert!(camera.set_surface(SurfaceSize::new(1000, 500)));
        assert!((camera.aspect - 2.0).abs() < 1e-6);
        assert!(!camera.set_surface(SurfaceSize::new(2000, 1000)));
    }

    #[test]
    fn test_zero_height_is_ignored() {
        let mut camera = Camera::new(800, 600);
        assert!(!camera.set_surface(SurfaceSize::new(800, 0)));
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(Camera::new(10, 0).aspect, 1.0);
    }
}
