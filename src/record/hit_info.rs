//! Per-ray compaction metadata (2 ints).

use super::{ensure_len, Record, WordReader, WordWriter};
use crate::util::Result;

/// Classification of one hit for the compaction pass.
///
/// `active` marks a ray that continues as a single specular segment;
/// `diffuse` is the number of diffuse expansions the hit requests (0 or 1).
/// These are the two channels scanned by `prepare`/`sweep_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HitInfo {
    pub active: bool,
    pub diffuse: u32,
}

impl HitInfo {
    /// Scan input for this slot: `[survivor, diffuse request]`.
    pub fn scan_values(&self) -> [u32; 2] {
        [u32::from(self.active), self.diffuse]
    }
}

impl Record for HitInfo {
    const FLOATS: usize = 0;
    const INTS: usize = 2;

    fn encode(&self, out: &mut [u8]) {
        let mut w = WordWriter::new(&mut out[..Self::SIZE]);
        w.u32(u32::from(self.active));
        w.u32(self.diffuse);
    }

    fn decode(data: &[u8]) -> Result<Self> {
        ensure_len::<Self>(data, "hit info")?;
        let mut r = WordReader::new(data);
        Ok(Self {
            active: r.u32() != 0,
            diffuse: r.u32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_info_scan_values() {
        let info = HitInfo { active: true, diffuse: 0 };
        assert_eq!(info.scan_values(), [1, 0]);
        let info = HitInfo { active: false, diffuse: 1 };
        assert_eq!(info.scan_values(), [0, 1]);
    }

    #[test]
    fn test_hit_info_roundtrip() {
        let mut buf = [0u8; 16];
        HitInfo { active: true, diffuse: 1 }.store(1, &mut buf).unwrap();
        assert_eq!(&buf[8..], &[1, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(HitInfo::load(1, &buf).unwrap(), HitInfo { active: true, diffuse: 1 });
        assert_eq!(HitInfo::load(0, &buf).unwrap(), HitInfo::default());
    }
}
