//! Camera record (27 floats): current pose, previous pose, lens.

use super::{ensure_len, Record, WordReader, WordWriter};
use crate::util::{Mat3, Result, Vec3};

/// Position plus orientation basis.
///
/// Basis columns are right, forward and up, in that order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub orientation: Mat3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Mat3::IDENTITY,
        }
    }
}

impl CameraPose {
    fn write(&self, w: &mut WordWriter<'_>) {
        w.vec3(self.position);
        for v in self.orientation.to_cols_array() {
            w.f32(v);
        }
    }

    fn read(r: &mut WordReader<'_>) -> Self {
        let position = r.vec3();
        let mut cols = [0.0f32; 9];
        for v in &mut cols {
            *v = r.f32();
        }
        Self {
            position,
            orientation: Mat3::from_cols_array(&cols),
        }
    }
}

/// Staged camera state read by `start`.
///
/// `previous` is the pose at the last motion update; primary rays interpolate
/// between it and `current` for motion blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRecord {
    pub current: CameraPose,
    pub previous: CameraPose,
    pub fov: f32,
    /// Lens aperture radius; `0` is a pinhole.
    pub aperture: f32,
    pub focus_distance: f32,
}

impl Record for CameraRecord {
    const FLOATS: usize = 27;
    const INTS: usize = 0;

    fn encode(&self, out: &mut [u8]) {
        let mut w = WordWriter::new(&mut out[..Self::SIZE]);
        self.current.write(&mut w);
        self.previous.write(&mut w);
        w.f32(self.fov);
        w.f32(self.aperture);
        w.f32(self.focus_distance);
    }

    fn decode(data: &[u8]) -> Result<Self> {
        ensure_len::<Self>(data, "camera")?;
        let mut r = WordReader::new(data);
        Ok(Self {
            current: CameraPose::read(&mut r),
            previous: CameraPose::read(&mut r),
            fov: r.f32(),
            aperture: r.f32(),
            focus_distance: r.f32(),
        })
    }
}
