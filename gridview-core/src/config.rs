/// Render-session configuration
use serde::{Deserialize, Serialize};

use crate::backend::Primitive;
use crate::error::RenderError;
use crate::geometry::GeometryMode;
use crate::shader::{FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE};
use crate::transform::RotationAxes;

pub const DEFAULT_DATA_PATH: &str = "data.json";
pub const DEFAULT_CANVAS_ID: &str = "webgl-canvas";

/// Everything a render session needs besides the backend and the points.
///
/// Every field has a default, so a config file only names what it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SessionConfig {
    pub data_path: String,
    pub canvas_id: String,
    pub geometry: GeometryMode,
    pub primitive: Primitive,
    pub rotation_axes: RotationAxes,
    /// Radians added per frame
    pub rotation_step: f32,
    pub camera_distance: f32,
    pub field_of_view: f32,
    pub near: f32,
    pub far: f32,
    pub clear_color: [f32; 4],
    pub vertex_shader: String,
    pub fragment_shader: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_path: DEFAULT_DATA_PATH.to_string(),
            canvas_id: DEFAULT_CANVAS_ID.to_string(),
            geometry: GeometryMode::Grid,
            primitive: Primitive::Lines,
            rotation_axes: RotationAxes::Y,
            rotation_step: 0.01,
            camera_distance: 6.0,
            field_of_view: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vertex_shader: VERTEX_SHADER_SOURCE.to_string(),
            fragment_shader: FRAGMENT_SHADER_SOURCE.to_string(),
        }
    }
}

impl SessionConfig {
    /// Parse a JSON config document and validate it
    pub fn from_json_str(json: &str) -> Result<Self, RenderError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RenderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if !self.rotation_step.is_finite() {
            return Err(RenderError::Config("rotation_step must be finite".into()));
        }
        if !(self.near > 0.0) {
            return Err(RenderError::Config("near plane must be positive".into()));
        }
        if !(self.far > self.near) {
            return Err(RenderError::Config(
                "far plane must lie beyond the near plane".into(),
            ));
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < std::f32::consts::PI) {
            return Err(RenderError::Config(
                "field_of_view must be in (0, pi) radians".into(),
            ));
        }
        if !(self.camera_distance.is_finite() && self.camera_distance > 0.0) {
            return Err(RenderError::Config(
                "camera_distance must be positive and finite".into(),
            ));
        }
        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(RenderError::Config(
                "clear_color components must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = SessionConfig::default();
        assert_eq!(config.data_path, "data.json");
        assert_eq!(config.canvas_id, "webgl-canvas");
        assert_eq!(config.rotation_step, 0.01);
        assert_eq!(config.camera_distance, 6.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config = SessionConfig::from_json_str(
            r#"{"geometry": "direct", "primitive": "points", "rotation_axes": "xy"}"#,
        )
        .unwrap();
        assert_eq!(config.geometry, GeometryMode::Direct);
        assert_eq!(config.primitive, Primitive::Points);
        assert_eq!(config.rotation_axes, RotationAxes::Xy);
        assert_eq!(config.near, 0.1);
    }

    #[test]
    fn test_rejects_bad_planes() {
        let err = SessionConfig::from_json_str(r#"{"near": 0.0}"#).unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
        assert!(SessionConfig::from_json_str(r#"{"near": 5.0, "far": 1.0}"#).is_err());
    }

    #[test]
    fn test_rejects_bad_camera_distance() {
        // Eye on the target, or behind it
        assert!(SessionConfig::from_json_str(r#"{"camera_distance": 0.0}"#).is_err());
        assert!(SessionConfig::from_json_str(r#"{"camera_distance": -6.0}"#).is_err());
        assert!(SessionConfig::from_json_str(r#"{"camera_distance": 2.5}"#).is_ok());
    }

    #[test]
    fn test_rejects_bad_fov_and_color() {
        assert!(SessionConfig::from_json_str(r#"{"field_of_view": 3.5}"#).is_err());
        assert!(SessionConfig::from_json_str(r#"{"clear_color": [0, 0, 2, 1]}"#).is_err());
    }

    #[test]
    fn test_rejects_unknown_enum() {
        let err = SessionConfig::from_json_str(r#"{"primitive": "triangles"}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
