//! Persistent render settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::device::SessionOptions;
use crate::scene::CameraRig;
use crate::util::{Error, Result, Vec3};

/// Render settings that persist between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    // Resolution (fixed for the lifetime of a render context)
    pub width: u32,
    pub height: u32,

    // Camera
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,

    // Depth of field
    pub aperture: f32,
    pub focus_distance: f32,

    // Run
    pub samples: u32,
    pub animate: bool,

    // Device
    pub high_performance: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            position: [0.0, 0.0, 0.0],
            yaw: 0.0,
            pitch: 0.0,
            fov: 0.5,
            aperture: 0.01,
            focus_distance: 4.0,
            samples: 64,
            animate: false,
            high_performance: true,
        }
    }
}

impl RenderSettings {
    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("raystream");
            p.push("settings.json");
            p
        })
    }

    /// Load from an explicit file; fields that are missing or invalid keep
    /// their defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::SettingsNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&json)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::default_path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Save as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        match Self::default_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    /// Replace invalid values with defaults, one field at a time
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.width == 0 || self.height == 0 {
            tracing::warn!("Invalid resolution {}x{}, using default", self.width, self.height);
            self.width = defaults.width;
            self.height = defaults.height;
        }
        if !self.position.iter().all(|c| c.is_finite()) {
            self.position = defaults.position;
        }
        if !self.yaw.is_finite() {
            self.yaw = defaults.yaw;
        }
        if !self.pitch.is_finite() {
            self.pitch = defaults.pitch;
        }
        if !(self.fov.is_finite() && self.fov > 0.0) {
            self.fov = defaults.fov;
        }
        if !(self.aperture.is_finite() && self.aperture >= 0.0) {
            self.aperture = defaults.aperture;
        }
        if !(self.focus_distance.is_finite() && self.focus_distance > 0.0) {
            self.focus_distance = defaults.focus_distance;
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            power_preference: if self.high_performance {
                wgpu::PowerPreference::HighPerformance
            } else {
                wgpu::PowerPreference::LowPower
            },
            ..SessionOptions::default()
        }
    }

    /// Apply the camera fields to a rig and start a fresh motion interval
    pub fn apply_camera(&self, rig: &mut CameraRig) {
        rig.set_position(Vec3::from_array(self.position));
        rig.set_orientation(self.yaw, self.pitch);
        rig.set_fov(self.fov);
        rig.set_dof(self.aperture, self.focus_distance);
        rig.commit_motion();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_fieldwise() {
        let mut s = RenderSettings {
            width: 0,
            fov: -1.0,
            aperture: 0.2,
            focus_distance: f32::NAN,
            ..Default::default()
        };
        s.sanitize();
        assert_eq!(s.width, 800);
        assert_eq!(s.height, 600);
        assert_eq!(s.fov, 0.5);
        assert_eq!(s.aperture, 0.2);
        assert_eq!(s.focus_distance, 4.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: RenderSettings = serde_json::from_str(r#"{"width": 320, "animate": true}"#).unwrap();
        assert_eq!(s.width, 320);
        assert_eq!(s.height, 600);
        assert!(s.animate);
        assert_eq!(s.samples, 64);
    }

    #[test]
    fn test_apply_camera() {
        let settings = RenderSettings {
            position: [1.0, 2.0, 3.0],
            fov: 0.7,
            ..Default::default()
        };
        let mut rig = CameraRig::default();
        settings.apply_camera(&mut rig);
        assert_eq!(rig.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(rig.fov(), 0.7);
        assert_eq!(rig.dof(), (0.01, 4.0));
        assert_eq!(rig.previous(), rig.pose());
    }
}
