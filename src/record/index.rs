//! Acceleration index record (4 floats + 4 ints).

use super::{ensure_len, Record, WordReader, WordWriter};
use crate::util::{Error, Result, Vec3};

/// Primitive tag of a scene object.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Two triangles given by six vertices.
    Surface = 1,
    /// Analytic sphere; its six vertices are only hints for the bounds.
    Sphere = 2,
}

impl TryFrom<i32> for PrimitiveKind {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::Surface),
            2 => Ok(Self::Sphere),
            other => Err(Error::record(format!("unknown primitive kind {other}"))),
        }
    }
}

/// Bounding-sphere entry for one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexRecord {
    pub center: Vec3,
    pub radius: f32,
    /// 1-based object id; hits report it, `0` means no object.
    pub id: i32,
    /// Float offset of the object's vertices in the shapes buffer.
    pub ptr: i32,
    pub kind: PrimitiveKind,
}

impl Record for IndexRecord {
    const FLOATS: usize = 4;
    const INTS: usize = 4;

    fn encode(&self, out: &mut [u8]) {
        let mut w = WordWriter::new(&mut out[..Self::SIZE]);
        w.vec3(self.center);
        w.f32(self.radius);
        w.i32(self.id);
        w.i32(self.ptr);
        w.i32(self.kind as i32);
        w.i32(0);
    }

    fn decode(data: &[u8]) -> Result<Self> {
        ensure_len::<Self>(data, "index")?;
        let mut r = WordReader::new(data);
        Ok(Self {
            center: r.vec3(),
            radius: r.f32(),
            id: r.i32(),
            ptr: r.i32(),
            kind: PrimitiveKind::try_from(r.i32())?,
        })
    }
}
