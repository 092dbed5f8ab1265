//! Built-in demo scene: a star, a larger star behind it and a spherical light.

use crate::record::PrimitiveKind;
use crate::scene::{Shape, SHAPE_FLOATS};
use crate::util::Result;

const BASE_Z: f64 = -1.0;
const AMPLITUDE: [f64; 2] = [0.5, 1.0];
const FREQUENCY: [f64; 6] = [-0.53, -0.47, -0.65, 0.58, 0.61, 0.55];
const TIME_STEP: f64 = 0.08;

const OBJECTS: usize = 3;
const EMITTER: usize = 2;

fn initial_coords() -> [f32; OBJECTS * SHAPE_FLOATS] {
    let h = 3f32.sqrt() / 2.0;
    let z = BASE_Z as f32;
    [
        // Star: two opposed unit triangles
        0.0, -1.0, z, h, 0.5, z, -h, 0.5, z,
        h, -0.5, z, 0.0, 1.0, z, -h, -0.5, z,
        // Background star, its triangles at different depths
        0.0, -4.0, -3.0, 4.0 * h, 2.0, -3.0, -4.0 * h, 2.0, -3.0,
        4.0 * h, -2.0, -1.0, 0.0, 4.0, -1.0, -4.0 * h, -2.0, -1.0,
        // Light: six hints around a sphere of radius ~0.5
        0.0, -0.5, 1.5, h / 2.0, 0.25, 1.5, -h / 2.0, 0.25, 1.5,
        h / 2.0, -0.25, 1.0, 0.0, 0.5, 1.0, -h / 2.0, -0.25, 1.0,
    ]
}

/// Demo geometry with an optional ripple on the front star.
#[derive(Debug, Clone)]
pub struct DemoScene {
    coords: [f32; OBJECTS * SHAPE_FLOATS],
    time: f64,
}

impl Default for DemoScene {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoScene {
    pub fn new() -> Self {
        Self {
            coords: initial_coords(),
            time: 0.0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    fn kind(j: usize) -> PrimitiveKind {
        if j == EMITTER {
            PrimitiveKind::Sphere
        } else {
            PrimitiveKind::Surface
        }
    }

    pub fn shapes(&self) -> Result<Vec<Shape>> {
        self.coords
            .chunks_exact(SHAPE_FLOATS)
            .enumerate()
            .map(|(j, c)| Shape::from_flat(Self::kind(j), c))
            .collect()
    }

    pub fn emitters(&self) -> Result<Vec<Shape>> {
        let at = EMITTER * SHAPE_FLOATS;
        Ok(vec![Shape::from_flat(
            PrimitiveKind::Sphere,
            &self.coords[at..at + SHAPE_FLOATS],
        )?])
    }

    /// Move the front star's vertices along z for the current time, then
    /// step the clock.
    pub fn advance(&mut self) {
        for (k, freq) in FREQUENCY.iter().enumerate() {
            let amp = AMPLITUDE[k / 3];
            self.coords[k * 3 + 2] = (amp * (freq * self.time).sin() + BASE_Z) as f32;
        }
        self.time += TIME_STEP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_layout() {
        let scene = DemoScene::new();
        let shapes = scene.shapes().unwrap();
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[2].kind, PrimitiveKind::Sphere);
        assert_eq!(scene.emitters().unwrap()[0], shapes[2]);

        let (center, radius) = shapes[0].bounding_sphere();
        assert!(center.distance(crate::util::Vec3::new(0.0, 0.0, -1.0)) < 1e-6);
        assert!((radius - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_advance_moves_front_star_only() {
        let mut scene = DemoScene::new();
        let before = scene.shapes().unwrap();
        scene.advance();
        scene.advance();
        let after = scene.shapes().unwrap();

        assert!((scene.time() - 0.16).abs() < 1e-12);
        assert_ne!(before[0], after[0]);
        assert_eq!(before[1], after[1]);
        assert_eq!(before[2], after[2]);
        for v in after[0].vertices {
            assert!((-2.0..=0.0).contains(&v.z));
        }
    }
}
