//! Fixed-layout binary records shared with the compute kernels.
//!
//! Every record is a run of 4-byte little-endian words: all floats first,
//! then all integers. Records are addressed by slot, `slot * SIZE` bytes into
//! a flat buffer. The WGSL side reads the same words through `bitcast`, so the
//! word order here and in `kernels/prelude.wgsl` must change together.

mod camera;
mod hit;
mod hit_info;
mod index;
mod ray;

pub use camera::{CameraPose, CameraRecord};
pub use hit::Hit;
pub use hit_info::HitInfo;
pub use index::{IndexRecord, PrimitiveKind};
pub use ray::{Ray, RayKind};

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result, Vec3};

/// Size of one record word in bytes.
pub const WORD: usize = 4;

/// A record with a fixed float/int layout.
pub trait Record: Sized {
    /// Number of leading float words.
    const FLOATS: usize;
    /// Number of trailing integer words.
    const INTS: usize;
    /// Record stride in bytes.
    const SIZE: usize = (Self::FLOATS + Self::INTS) * WORD;
    /// Byte offset of the integer block.
    const INT_OFFSET: usize = Self::FLOATS * WORD;

    /// Write the record into `out[..Self::SIZE]`.
    fn encode(&self, out: &mut [u8]);

    /// Read a record from `data[..Self::SIZE]`.
    fn decode(data: &[u8]) -> Result<Self>;

    /// Store at `slot` within a flat record buffer.
    fn store(&self, slot: usize, buffer: &mut [u8]) -> Result<()> {
        let range = slot_range::<Self>(slot, buffer.len())?;
        self.encode(&mut buffer[range]);
        Ok(())
    }

    /// Load from `slot` within a flat record buffer.
    fn load(slot: usize, buffer: &[u8]) -> Result<Self> {
        let range = slot_range::<Self>(slot, buffer.len())?;
        Self::decode(&buffer[range])
    }
}

/// Encode a slice of records into a freshly allocated flat buffer.
pub fn encode_all<R: Record>(records: &[R]) -> Vec<u8> {
    let mut out = vec![0u8; records.len() * R::SIZE];
    for (record, chunk) in records.iter().zip(out.chunks_exact_mut(R::SIZE)) {
        record.encode(chunk);
    }
    out
}

/// Decode every whole record in a flat buffer.
pub fn decode_all<R: Record>(data: &[u8]) -> Result<Vec<R>> {
    data.chunks_exact(R::SIZE).map(R::decode).collect()
}

fn slot_range<R: Record>(slot: usize, len: usize) -> Result<std::ops::Range<usize>> {
    let start = slot
        .checked_mul(R::SIZE)
        .ok_or_else(|| Error::record("slot offset overflow"))?;
    let end = start + R::SIZE;
    if end > len {
        return Err(Error::record(format!(
            "slot {slot} ({start}..{end}) outside buffer of {len} bytes"
        )));
    }
    Ok(start..end)
}

// ============================================================================
// Word cursors
// ============================================================================

/// Sequential little-endian word writer over a record slice.
pub(crate) struct WordWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WordWriter<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn f32(&mut self, v: f32) {
        LittleEndian::write_f32(&mut self.buf[self.pos..self.pos + WORD], v);
        self.pos += WORD;
    }

    pub(crate) fn vec3(&mut self, v: Vec3) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
    }

    pub(crate) fn i32(&mut self, v: i32) {
        LittleEndian::write_i32(&mut self.buf[self.pos..self.pos + WORD], v);
        self.pos += WORD;
    }

    pub(crate) fn u32(&mut self, v: u32) {
        LittleEndian::write_u32(&mut self.buf[self.pos..self.pos + WORD], v);
        self.pos += WORD;
    }
}

/// Sequential little-endian word reader over a record slice.
pub(crate) struct WordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn f32(&mut self) -> f32 {
        let v = LittleEndian::read_f32(&self.buf[self.pos..self.pos + WORD]);
        self.pos += WORD;
        v
    }

    pub(crate) fn vec3(&mut self) -> Vec3 {
        let x = self.f32();
        let y = self.f32();
        let z = self.f32();
        Vec3::new(x, y, z)
    }

    pub(crate) fn i32(&mut self) -> i32 {
        let v = LittleEndian::read_i32(&self.buf[self.pos..self.pos + WORD]);
        self.pos += WORD;
        v
    }

    pub(crate) fn u32(&mut self) -> u32 {
        let v = LittleEndian::read_u32(&self.buf[self.pos..self.pos + WORD]);
        self.pos += WORD;
        v
    }
}

/// Check that a slice holds at least one record of `R`.
pub(crate) fn ensure_len<R: Record>(data: &[u8], what: &str) -> Result<()> {
    if data.len() < R::SIZE {
        return Err(Error::record(format!(
            "{what} needs {} bytes, got {}",
            R::SIZE,
            data.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_cursor_roundtrip() {
        let mut buf = [0u8; 20];
        let mut w = WordWriter::new(&mut buf);
        w.vec3(Vec3::new(1.0, -2.5, 3.25));
        w.i32(-7);
        w.u32(0xDEAD_BEEF);

        let mut r = WordReader::new(&buf);
        assert_eq!(r.vec3(), Vec3::new(1.0, -2.5, 3.25));
        assert_eq!(r.i32(), -7);
        assert_eq!(r.u32(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_words_are_little_endian() {
        let mut buf = [0u8; 4];
        WordWriter::new(&mut buf).i32(0x0403_0201);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_record_strides() {
        assert_eq!(Ray::SIZE, 56);
        assert_eq!(Hit::SIZE, 64);
        assert_eq!(Hit::INT_OFFSET, 48);
        assert_eq!(HitInfo::SIZE, 8);
        assert_eq!(IndexRecord::SIZE, 32);
        assert_eq!(CameraRecord::SIZE, 108);
    }
}
