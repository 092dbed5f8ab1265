//! Settings persistence

use raystream::{Error, RenderSettings};
use tempfile::TempDir;

#[test]
fn test_save_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let settings = RenderSettings {
        width: 640,
        height: 480,
        position: [0.5, -1.0, 2.0],
        yaw: 0.25,
        samples: 256,
        animate: true,
        high_performance: false,
        ..Default::default()
    };
    settings.save_to(&path).unwrap();
    assert!(path.exists());

    let loaded = RenderSettings::load_from(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    match RenderSettings::load_from(&path) {
        Err(Error::SettingsNotFound(p)) => assert_eq!(p, path),
        other => panic!("expected SettingsNotFound, got {other:?}"),
    }
}

#[test]
fn test_malformed_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ width: ").unwrap();
    assert!(matches!(RenderSettings::load_from(&path), Err(Error::Json(_))));
}

#[test]
fn test_invalid_fields_sanitized_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"width": 0, "height": 100, "fov": -2.0, "aperture": 0.05, "samples": 8}"#,
    )
    .unwrap();

    let loaded = RenderSettings::load_from(&path).unwrap();
    let defaults = RenderSettings::default();
    assert_eq!((loaded.width, loaded.height), (defaults.width, defaults.height));
    assert_eq!(loaded.fov, defaults.fov);
    assert_eq!(loaded.aperture, 0.05);
    assert_eq!(loaded.samples, 8);
}

#[test]
fn test_low_power_session_options() {
    let settings = RenderSettings {
        high_performance: false,
        ..Default::default()
    };
    assert_eq!(
        settings.session_options().power_preference,
        wgpu::PowerPreference::LowPower
    );
}
