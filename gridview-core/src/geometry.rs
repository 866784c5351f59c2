/// Point samples and the flat vertex sequences built from them
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Upper bound on the lines a grid may contain (two vertices each)
pub const MAX_GRID_LINES: usize = 1 << 16;

/// One sample of the source dataset
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Point> for Point3<f32> {
    fn from(p: Point) -> Self {
        Point3::new(p.x, p.y, p.z)
    }
}

/// How the vertex sequence is derived from the points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryMode {
    /// One vertex per point
    Direct,
    /// Unit-step line grid over the points' XY bounding box
    #[default]
    Grid,
}

/// Axis-aligned XY extent of a point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Bounds {
    /// Returns `None` for an empty point set
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Bounds {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        Some(points.iter().skip(1).fold(init, |b, p| Bounds {
            min_x: b.min_x.min(p.x),
            max_x: b.max_x.max(p.x),
            min_y: b.min_y.min(p.y),
            max_y: b.max_y.max(p.y),
        }))
    }
}

/// Integer steps `floor(min)..=ceil(max)`, checked to be finite and short
fn grid_steps(min: f32, max: f32) -> Result<std::ops::RangeInclusive<i64>, RenderError> {
    let (lo, hi) = (f64::from(min).floor(), f64::from(max).ceil());
    if !lo.is_finite() || !hi.is_finite() {
        return Err(RenderError::Geometry(format!(
            "grid bounds [{min}, {max}] are not finite"
        )));
    }
    if hi - lo >= MAX_GRID_LINES as f64 {
        return Err(RenderError::Geometry(format!(
            "grid over [{min}, {max}] exceeds {MAX_GRID_LINES} lines"
        )));
    }
    Ok(lo as i64..=hi as i64)
}

/// Flat `x, y, z` float sequence, always a whole number of vertices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexSequence {
    data: Vec<f32>,
}

impl VertexSequence {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            data: Vec::with_capacity(vertices * 3),
        }
    }

    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        self.data.extend_from_slice(&[x, y, z]);
    }

    /// One vertex per point, in input order
    pub fn from_points(points: &[Point]) -> Self {
        let mut seq = Self::with_capacity(points.len());
        for p in points {
            seq.push(p.x, p.y, p.z);
        }
        seq
    }

    /// Line-pair grid at unit step over the bounding box of `points`.
    ///
    /// Vertical lines run from `min_y` to `max_y` at every integer x in
    /// `floor(min_x)..=ceil(max_x)`; horizontal lines run from `min_x` to
    /// `max_x` at every integer y in `floor(min_y)..=ceil(max_y)`. All
    /// vertices lie on z = 0.
    ///
    /// Bounds that are not finite, or that span more than [`MAX_GRID_LINES`]
    /// lines, are rejected before anything is allocated.
    pub fn grid(points: &[Point]) -> Result<Self, RenderError> {
        let Some(b) = Bounds::of(points) else {
            return Ok(Self::new());
        };

        let xs = grid_steps(b.min_x, b.max_x)?;
        let ys = grid_steps(b.min_y, b.max_y)?;
        let lines = xs
            .clone()
            .count()
            .checked_add(ys.clone().count())
            .filter(|&lines| lines <= MAX_GRID_LINES)
            .ok_or_else(|| {
                RenderError::Geometry(format!(
                    "grid over [{}, {}] x [{}, {}] exceeds {MAX_GRID_LINES} lines",
                    b.min_x, b.max_x, b.min_y, b.max_y
                ))
            })?;
        let mut seq = Self::with_capacity(lines * 2);

        for x in xs {
            let x = x as f32;
            seq.push(x, b.min_y, 0.0);
            seq.push(x, b.max_y, 0.0);
        }
        for y in ys {
            let y = y as f32;
            seq.push(b.min_x, y, 0.0);
            seq.push(b.max_x, y, 0.0);
        }

        Ok(seq)
    }

    pub fn build(mode: GeometryMode, points: &[Point]) -> Result<Self, RenderError> {
        match mode {
            GeometryMode::Direct => Ok(Self::from_points(points)),
            GeometryMode::Grid => Self::grid(points),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / 3
    }

    pub fn vertices(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.data
            .chunks_exact(3)
            .map(|v| Point3::new(v[0], v[1], v[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_sequence() {
        let points = [Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 1.0)];
        let seq = VertexSequence::from_points(&points);
        assert_eq!(seq.as_slice(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(seq.vertex_count(), 2);
    }

    #[test]
    fn test_direct_length_is_three_per_point() {
        let points: Vec<Point> = (0..17).map(|i| Point::new(i as f32, -1.0, 0.5)).collect();
        let seq = VertexSequence::from_points(&points);
        assert_eq!(seq.len(), 3 * points.len());
        assert_eq!(seq.vertex_count(), points.len());
    }

    #[test]
    fn test_grid_example() {
        let points = [Point::new(0.0, 0.0, 0.0), Point::new(2.0, 1.0, 5.0)];
        let seq = VertexSequence::grid(&points).unwrap();
        // 3 vertical + 2 horizontal lines, two vertices each
        assert_eq!(seq.vertex_count(), 10);

        let v: Vec<_> = seq.vertices().collect();
        assert_eq!(v[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(v[1], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(v[4], Point3::new(2.0, 0.0, 0.0));
        assert_eq!(v[5], Point3::new(2.0, 1.0, 0.0));
        assert_eq!(v[6], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(v[7], Point3::new(2.0, 0.0, 0.0));
        assert_eq!(v[9], Point3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_grid_fractional_bounds() {
        let points = [Point::new(-0.5, 0.25, 0.0), Point::new(1.5, 0.75, 0.0)];
        let seq = VertexSequence::grid(&points).unwrap();
        // x in -1..=2 (4 lines), y in 0..=1 (2 lines)
        assert_eq!(seq.vertex_count(), 12);

        let v: Vec<_> = seq.vertices().collect();
        // Vertical lines span the exact y extent, not the rounded one
        assert_eq!(v[0], Point3::new(-1.0, 0.25, 0.0));
        assert_eq!(v[1], Point3::new(-1.0, 0.75, 0.0));
        // Horizontal lines span the exact x extent
        assert_eq!(v[8], Point3::new(-0.5, 0.0, 0.0));
        assert_eq!(v[9], Point3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn test_grid_is_deterministic() {
        let points = [
            Point::new(3.2, -1.0, 0.0),
            Point::new(-2.0, 4.5, 1.0),
            Point::new(0.0, 0.0, 0.0),
        ];
        assert_eq!(
            VertexSequence::grid(&points).unwrap(),
            VertexSequence::grid(&points).unwrap()
        );
    }

    #[test]
    fn test_grid_single_point() {
        let seq = VertexSequence::grid(&[Point::new(1.0, 1.0, 0.0)]).unwrap();
        assert_eq!(seq.vertex_count(), 4);
        assert_eq!(seq.len() % 3, 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(VertexSequence::grid(&[]).unwrap().is_empty());
        assert!(VertexSequence::from_points(&[]).is_empty());
        assert!(Bounds::of(&[]).is_none());
    }

    #[test]
    fn test_grid_rejects_huge_extent() {
        let points = crate::loader::parse_points(
            br#"[{"x": 0, "y": 0}, {"x": 1e12, "y": 1}]"#,
            "data.json",
        )
        .unwrap();
        let err = VertexSequence::grid(&points).unwrap_err();
        assert!(matches!(err, RenderError::Geometry(_)));
        assert!(err.to_string().contains("exceeds"));

        // Direct mode has no such limit
        let direct = VertexSequence::build(GeometryMode::Direct, &points).unwrap();
        assert_eq!(direct.vertex_count(), 2);
    }

    #[test]
    fn test_grid_rejects_infinite_bounds() {
        let points = [Point::new(0.0, 0.0, 0.0), Point::new(f32::INFINITY, 1.0, 0.0)];
        let err = VertexSequence::build(GeometryMode::Grid, &points).unwrap_err();
        assert!(err.to_string().contains("not finite"));
    }

    #[test]
    fn test_grid_at_line_limit() {
        // (MAX_GRID_LINES - 2) vertical lines plus 2 horizontal ones
        let max_x = (MAX_GRID_LINES - 3) as f32;
        let points = [Point::new(0.0, 0.0, 0.0), Point::new(max_x, 1.0, 0.0)];
        let seq = VertexSequence::grid(&points).unwrap();
        assert_eq!(seq.vertex_count(), MAX_GRID_LINES * 2);

        let points = [Point::new(0.0, 0.0, 0.0), Point::new(max_x + 1.0, 1.0, 0.0)];
        assert!(VertexSequence::grid(&points).is_err());
    }

    #[test]
    fn test_point_z_defaults_to_zero() {
        let p: Point = serde_json::from_str(r#"{"x": 1.5, "y": -2}"#).unwrap();
        assert_eq!(p, Point::new(1.5, -2.0, 0.0));
    }
}
