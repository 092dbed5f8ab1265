//! Hit record (12 floats + 4 ints).

use super::{ensure_len, RayKind, Record, WordReader, WordWriter};
use crate::util::{IVec2, Result, Vec3};

/// Nearest intersection of one ray, written by `intersect`.
///
/// `object` is the 1-based object id, `0` for a miss. `color` carries the
/// incoming ray's throughput so shading does not need the ray buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub pos: Vec3,
    pub dir: Vec3,
    pub norm: Vec3,
    pub color: Vec3,
    pub origin: IVec2,
    pub object: i32,
    pub kind: RayKind,
}

impl Hit {
    pub fn is_miss(&self) -> bool {
        self.object == 0
    }
}

impl Record for Hit {
    const FLOATS: usize = 12;
    const INTS: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        let mut w = WordWriter::new(&mut out[..Self::SIZE]);
        w.vec3(self.pos);
        w.vec3(self.dir);
        w.vec3(self.norm);
        w.vec3(self.color);
        w.i32(self.origin.x);
        w.i32(self.origin.y);
        w.i32(self.object);
        w.i32(self.kind.as_i32());
    }

    fn decode(data: &[u8]) -> Result<Self> {
        ensure_len::<Self>(data, "hit")?;
        let mut r = WordReader::new(data);
        Ok(Self {
            pos: r.vec3(),
            dir: r.vec3(),
            norm: r.vec3(),
            color: r.vec3(),
            origin: IVec2::new(r.i32(), r.i32()),
            object: r.i32(),
            kind: RayKind::try_from(r.i32())?,
        })
    }
}
