//! Ray record (9 floats + 5 ints).

use super::{ensure_len, Record, WordReader, WordWriter};
use crate::util::{Error, IVec2, Result, Vec3};

/// How a ray reached its current segment.
///
/// `Direct` rays come from the camera or a specular bounce and pick up emitter
/// radiance on contact. `Diffuse` rays were spawned by diffuse expansion and
/// skip it, since shading already sampled the emitters at their origin.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RayKind {
    Direct = 1,
    Diffuse = 2,
}

impl RayKind {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for RayKind {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::Direct),
            2 => Ok(Self::Diffuse),
            other => Err(Error::record(format!("unknown ray kind {other}"))),
        }
    }
}

/// One in-flight ray segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    /// Path throughput carried by this segment.
    pub weight: Vec3,
    /// Pixel this path contributes to.
    pub pixel: IVec2,
    pub depth: i32,
    pub kind: RayKind,
    pub rng: u32,
}

impl Record for Ray {
    const FLOATS: usize = 9;
    const INTS: usize = 5;

    fn encode(&self, out: &mut [u8]) {
        let mut w = WordWriter::new(&mut out[..Self::SIZE]);
        w.vec3(self.origin);
        w.vec3(self.dir);
        w.vec3(self.weight);
        w.i32(self.pixel.x);
        w.i32(self.pixel.y);
        w.i32(self.depth);
        w.i32(self.kind.as_i32());
        w.u32(self.rng);
    }

    fn decode(data: &[u8]) -> Result<Self> {
        ensure_len::<Self>(data, "ray")?;
        let mut r = WordReader::new(data);
        Ok(Self {
            origin: r.vec3(),
            dir: r.vec3(),
            weight: r.vec3(),
            pixel: IVec2::new(r.i32(), r.i32()),
            depth: r.i32(),
            kind: RayKind::try_from(r.i32())?,
            rng: r.u32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ray() -> Ray {
        Ray {
            origin: Vec3::new(0.5, -1.0, 2.0),
            dir: Vec3::new(0.0, 1.0, 0.0),
            weight: Vec3::new(0.8, 0.4, 0.2),
            pixel: IVec2::new(17, 3),
            depth: 2,
            kind: RayKind::Diffuse,
            rng: 3_942_082_377,
        }
    }

    #[test]
    fn test_ray_roundtrip_at_slot() {
        let mut buf = vec![0u8; Ray::SIZE * 4];
        let ray = sample_ray();
        ray.store(3, &mut buf).unwrap();
        assert_eq!(Ray::load(3, &buf).unwrap(), ray);
        // Neighbouring slots untouched
        assert!(buf[..Ray::SIZE * 3].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_ray_int_block_position() {
        let mut buf = vec![0u8; Ray::SIZE];
        sample_ray().encode(&mut buf);
        // pixel.x is the first int word, after 9 floats
        assert_eq!(&buf[36..40], &17i32.to_le_bytes());
        // rng is the last word
        assert_eq!(&buf[52..56], &3_942_082_377u32.to_le_bytes());
    }

    #[test]
    fn test_ray_rejects_unknown_kind() {
        let mut buf = vec![0u8; Ray::SIZE];
        sample_ray().encode(&mut buf);
        buf[48..52].copy_from_slice(&9i32.to_le_bytes());
        assert!(Ray::decode(&buf).is_err());
    }

    #[test]
    fn test_ray_store_out_of_bounds() {
        let mut buf = vec![0u8; Ray::SIZE * 2];
        assert!(sample_ray().store(2, &mut buf).is_err());
    }
}
