/// Rotation state and model-view construction
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::projection::Camera;

/// Which axes the animation rotates about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationAxes {
    /// Spin about Y only
    #[default]
    Y,
    /// Rotate about X, then Y
    Xy,
}

/// Rotation angles in radians.
///
/// Angles are never wrapped; trigonometric periodicity takes care of that.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Advance one animation step on the active axes
    pub fn advance(&mut self, axes: RotationAxes, step: f32) {
        match axes {
            RotationAxes::Y => self.rotate(0.0, step),
            RotationAxes::Xy => self.rotate(step, step),
        }
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Rotation matrix for the active axes: `Ry` or `Rx * Ry`
    pub fn rotation_matrix(rotation: &RotationState, axes: RotationAxes) -> Matrix4<f32> {
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        match axes {
            RotationAxes::Y => ry,
            RotationAxes::Xy => {
                let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
                rx * ry
            }
        }
    }

    /// Translate back from the camera, then rotate the model
    pub fn model_view(camera: &Camera, rotation: &RotationState, axes: RotationAxes) -> Matrix4<f32> {
        camera.view_matrix() * Self::rotation_matrix(rotation, axes)
    }
}
