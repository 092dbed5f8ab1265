//! Camera rig: the host-side state behind the staged camera record.

use crate::record::{CameraPose, CameraRecord};
use crate::util::{Mat3, Vec3};

/// Right, forward and up at zero yaw and pitch.
const REST_BASIS: Mat3 = Mat3::from_cols(Vec3::X, Vec3::NEG_Z, Vec3::Y);

/// Position, yaw/pitch and lens of the viewer.
///
/// At zero yaw and pitch the camera looks along -z with +y up. Yaw turns
/// about the world y axis, pitch tilts the view up. The pose at the last
/// [`CameraRig::commit_motion`] is kept for motion blur.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    fov: f32,
    aperture: f32,
    focus_distance: f32,
    previous: CameraPose,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            fov: 0.5,
            aperture: 0.0,
            focus_distance: 1.0,
            previous: CameraPose {
                position: Vec3::ZERO,
                orientation: REST_BASIS,
            },
        }
    }
}

impl CameraRig {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut rig = Self {
            position,
            yaw,
            pitch,
            ..Self::default()
        };
        rig.previous = rig.pose();
        rig
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Depth of field: lens radius and distance of the sharp plane.
    pub fn set_dof(&mut self, aperture: f32, focus_distance: f32) {
        self.aperture = aperture;
        self.focus_distance = focus_distance;
    }

    pub fn dof(&self) -> (f32, f32) {
        (self.aperture, self.focus_distance)
    }

    /// Basis with columns right, forward, up.
    pub fn orientation(&self) -> Mat3 {
        Mat3::from_rotation_y(self.yaw) * Mat3::from_rotation_x(self.pitch) * REST_BASIS
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            orientation: self.orientation(),
        }
    }

    pub fn previous(&self) -> CameraPose {
        self.previous
    }

    /// Make the current pose the motion-blur start.
    pub fn commit_motion(&mut self) {
        self.previous = self.pose();
    }

    pub fn record(&self) -> CameraRecord {
        CameraRecord {
            current: self.pose(),
            previous: self.previous,
            fov: self.fov,
            aperture: self.aperture,
            focus_distance: self.focus_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_basis() {
        let rig = CameraRig::default();
        let m = rig.orientation();
        assert_eq!(m.x_axis, Vec3::X);
        assert_eq!(m.y_axis, Vec3::NEG_Z);
        assert_eq!(m.z_axis, Vec3::Y);
        // Right-handed: right x forward = up
        assert!(m.x_axis.cross(m.y_axis).distance(m.z_axis) < 1e-6);
    }

    #[test]
    fn test_default_has_no_motion() {
        let rig = CameraRig::default();
        assert_eq!(rig.previous(), rig.pose());
    }

    #[test]
    fn test_yaw_turns_forward() {
        let mut rig = CameraRig::default();
        rig.set_orientation(std::f32::consts::FRAC_PI_2, 0.0);
        let forward = rig.orientation().y_axis;
        assert!(forward.distance(-Vec3::X) < 1e-6);
        // Up stays up under pure yaw
        assert!(rig.orientation().z_axis.distance(Vec3::Y) < 1e-6);
    }

    #[test]
    fn test_pitch_tilts_forward_up() {
        let mut rig = CameraRig::default();
        rig.set_orientation(0.0, 0.3);
        let forward = rig.orientation().y_axis;
        assert!(forward.y > 0.0);
        assert!((forward.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_motion_history() {
        let mut rig = CameraRig::new(Vec3::new(0.0, -4.0, 0.0), 0.0, 0.0);
        assert_eq!(rig.record().previous, rig.pose());

        rig.set_position(Vec3::new(1.0, -4.0, 0.0));
        let record = rig.record();
        assert_eq!(record.previous.position, Vec3::new(0.0, -4.0, 0.0));
        assert_eq!(record.current.position, Vec3::new(1.0, -4.0, 0.0));

        rig.commit_motion();
        assert_eq!(rig.record().previous.position, Vec3::new(1.0, -4.0, 0.0));
    }
}
