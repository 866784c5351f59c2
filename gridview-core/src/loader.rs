/// Geometry loading: JSON decoding and response checks shared by every host
use std::fs;
use std::path::Path;

use crate::error::LoadError;
use crate::geometry::Point;

/// Decode a JSON array of `{x, y, z?}` objects
pub fn parse_points(bytes: &[u8], resource: &str) -> Result<Vec<Point>, LoadError> {
    let points: Vec<Point> = serde_json::from_slice(bytes).map_err(|source| LoadError::Parse {
        resource: resource.to_string(),
        source,
    })?;
    tracing::debug!(resource, count = points.len(), "parsed point dataset");
    Ok(points)
}

/// Reject any response outside the 2xx range
pub fn check_status(resource: &str, status: u16, status_text: &str) -> Result<(), LoadError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(LoadError::Http {
            resource: resource.to_string(),
            status,
            status_text: status_text.to_string(),
        })
    }
}

/// Read and decode a point dataset from the local filesystem
pub fn load_points_file(path: impl AsRef<Path>) -> Result<Vec<Point>, LoadError> {
    let path = path.as_ref();
    let resource = path.display().to_string();
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        resource: resource.clone(),
        source,
    })?;
    parse_points(&bytes, &resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points() {
        let points = parse_points(br#"[{"x":0,"y":0,"z":0},{"x":1,"y":1,"z":1}]"#, "data.json")
            .unwrap();
        assert_eq!(points, vec![Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 1.0)]);
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_points(b"[]", "data.json").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_points(b"[{\"x\": 1,", "data.json").unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().starts_with("failed to parse JSON from data.json"));
    }

    #[test]
    fn test_wrong_shape() {
        assert!(parse_points(br#"{"x":1,"y":2}"#, "data.json").is_err());
        assert!(parse_points(br#"[{"x":"a","y":2}]"#, "data.json").is_err());
    }

    #[test]
    fn test_status_check() {
        assert!(check_status("data.json", 200, "OK").is_ok());
        assert!(check_status("data.json", 204, "No Content").is_ok());
        match check_status("data.json", 404, "Not Found") {
            Err(LoadError::Http { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected HTTP error, got {:?}", other),
        }
        assert!(check_status("data.json", 304, "Not Modified").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_points_file("/nonexistent/gridview/data.json").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("gridview-load-{}.json", std::process::id()));
        fs::write(&path, r#"[{"x":-1,"y":2},{"x":3,"y":4,"z":5}]"#).unwrap();
        let points = load_points_file(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].z, 0.0);
    }
}
