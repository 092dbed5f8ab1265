//! Scene objects and the bounding-sphere index built from them.

use crate::record::{IndexRecord, PrimitiveKind};
use crate::util::{Error, Result, Vec3};

/// Vertices per object: two triangles, or six hints for a sphere.
pub const SHAPE_VERTICES: usize = 6;
/// Floats per object in the shapes buffer.
pub const SHAPE_FLOATS: usize = SHAPE_VERTICES * 3;
/// Objects the shapes and index buffers hold.
pub const MAX_OBJECTS: usize = 16;
/// Emitters the emitter buffer holds.
pub const MAX_EMITTERS: usize = 4;

/// One scene object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub kind: PrimitiveKind,
    pub vertices: [Vec3; SHAPE_VERTICES],
}

impl Shape {
    pub fn surface(vertices: [Vec3; SHAPE_VERTICES]) -> Self {
        Self {
            kind: PrimitiveKind::Surface,
            vertices,
        }
    }

    /// Sphere whose bounds are derived from six points on or near it.
    pub fn sphere(hints: [Vec3; SHAPE_VERTICES]) -> Self {
        Self {
            kind: PrimitiveKind::Sphere,
            vertices: hints,
        }
    }

    /// Read one object from 18 floats.
    pub fn from_flat(kind: PrimitiveKind, coords: &[f32]) -> Result<Self> {
        if coords.len() != SHAPE_FLOATS {
            return Err(Error::geometry(format!(
                "object needs {SHAPE_FLOATS} floats, got {}",
                coords.len()
            )));
        }
        let mut vertices = [Vec3::ZERO; SHAPE_VERTICES];
        for (v, c) in vertices.iter_mut().zip(coords.chunks_exact(3)) {
            *v = Vec3::new(c[0], c[1], c[2]);
        }
        let shape = Self { kind, vertices };
        shape.validate()?;
        Ok(shape)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vertices.iter().any(|v| !v.is_finite()) {
            return Err(Error::geometry("non-finite vertex"));
        }
        Ok(())
    }

    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        bounding_sphere(&self.vertices)
    }

    pub fn flat(&self) -> [f32; SHAPE_FLOATS] {
        let mut out = [0.0; SHAPE_FLOATS];
        for (c, v) in out.chunks_exact_mut(3).zip(&self.vertices) {
            c.copy_from_slice(&v.to_array());
        }
        out
    }
}

/// Centroid of the points and the largest distance from it.
pub fn bounding_sphere(points: &[Vec3]) -> (Vec3, f32) {
    if points.is_empty() {
        return (Vec3::ZERO, 0.0);
    }
    let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let radius = points
        .iter()
        .map(|p| p.distance_squared(center))
        .fold(0.0f32, f32::max)
        .sqrt();
    (center, radius)
}

/// Index entry per object: 1-based id, float offset of its vertices.
pub fn build_index(shapes: &[Shape]) -> Vec<IndexRecord> {
    shapes
        .iter()
        .enumerate()
        .map(|(j, shape)| {
            let (center, radius) = shape.bounding_sphere();
            IndexRecord {
                center,
                radius,
                id: j as i32 + 1,
                ptr: (j * SHAPE_FLOATS) as i32,
                kind: shape.kind,
            }
        })
        .collect()
}

/// Concatenated vertex floats of all shapes.
pub fn flatten(shapes: &[Shape]) -> Vec<f32> {
    shapes.iter().flat_map(|s| s.flat()).collect()
}

/// Reject geometry that does not fit the fixed buffers.
pub fn validate_scene(shapes: &[Shape], max: usize, what: &str) -> Result<()> {
    if shapes.len() > max {
        return Err(Error::geometry(format!(
            "{} {what}s exceed the limit of {max}",
            shapes.len()
        )));
    }
    shapes.iter().try_for_each(Shape::validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexagon(center: Vec3, r: f32) -> [Vec3; 6] {
        std::array::from_fn(|k| {
            let a = k as f32 * std::f32::consts::FRAC_PI_3;
            center + Vec3::new(r * a.cos(), r * a.sin(), 0.0)
        })
    }

    #[test]
    fn test_hexagon_bounds() {
        let shape = Shape::surface(hexagon(Vec3::ZERO, 1.0));
        let (center, radius) = shape.bounding_sphere();
        assert!(center.length() < 1e-6);
        assert!((radius - 1.0).abs() < 1e-6);

        let shape = Shape::surface(hexagon(Vec3::new(2.0, -1.0, 0.5), 1.0));
        let (center, radius) = shape.bounding_sphere();
        assert!(center.distance(Vec3::new(2.0, -1.0, 0.5)) < 1e-5);
        assert!((radius - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_build_index() {
        let shapes = [
            Shape::surface(hexagon(Vec3::ZERO, 1.0)),
            Shape::sphere(hexagon(Vec3::Z, 0.5)),
        ];
        let index = build_index(&shapes);
        assert_eq!(index.len(), 2);
        assert_eq!(index[0].id, 1);
        assert_eq!(index[0].ptr, 0);
        assert_eq!(index[1].id, 2);
        assert_eq!(index[1].ptr, 18);
        assert_eq!(index[1].kind, PrimitiveKind::Sphere);
        assert!((index[1].radius - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_flat() {
        let coords: Vec<f32> = (0..18).map(|i| i as f32).collect();
        let shape = Shape::from_flat(PrimitiveKind::Surface, &coords).unwrap();
        assert_eq!(shape.vertices[1], Vec3::new(3.0, 4.0, 5.0));
        assert_eq!(shape.flat().to_vec(), coords);
        assert_eq!(flatten(&[shape, shape]).len(), 36);

        assert!(Shape::from_flat(PrimitiveKind::Surface, &coords[..17]).is_err());
        let mut bad = coords.clone();
        bad[4] = f32::NAN;
        assert!(Shape::from_flat(PrimitiveKind::Surface, &bad).is_err());
    }

    #[test]
    fn test_validate_scene_limit() {
        let shapes = vec![Shape::surface(hexagon(Vec3::ZERO, 1.0)); MAX_OBJECTS + 1];
        assert!(validate_scene(&shapes, MAX_OBJECTS, "object").is_err());
        assert!(validate_scene(&shapes[..MAX_OBJECTS], MAX_OBJECTS, "object").is_ok());
    }
}
