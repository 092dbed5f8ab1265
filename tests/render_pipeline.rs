//! End-to-end rendering on a device; skipped when no adapter is present

mod common;

use common::try_session;
use raystream::device::ProgramOptions;
use raystream::pipeline::{RenderContext, MAX_DEPTH};
use raystream::scene::{DemoScene, Shape, MAX_OBJECTS};
use raystream::util::Vec3;
use raystream::Error;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 24;

fn demo_context() -> Option<RenderContext> {
    let session = try_session()?;
    let mut ctx = RenderContext::new(session, WIDTH, HEIGHT, ProgramOptions::default()).unwrap();
    let scene = DemoScene::new();
    ctx.load_geometry(&scene.shapes().unwrap()).unwrap();
    ctx.load_emitters(&scene.emitters().unwrap()).unwrap();
    let camera = ctx.camera_mut();
    camera.set_position(Vec3::new(0.0, 0.0, 0.0));
    camera.set_orientation(0.0, 0.0);
    camera.set_fov(0.9);
    camera.set_dof(0.0, 4.0);
    ctx.update_motion();
    Some(ctx)
}

fn mean_abs_diff(a: &[Vec3], b: &[Vec3]) -> f32 {
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (*x - *y).abs().element_sum()).sum();
    sum / (a.len() * 3) as f32
}

#[test]
fn test_frame_stats() {
    let Some(mut ctx) = demo_context() else {
        return;
    };
    let stats = ctx.render_sample().unwrap();
    assert_eq!(stats.sample, 1);
    assert_eq!(stats.blend_weight, 1.0);
    assert!(!stats.bounces.is_empty() && stats.bounces.len() <= MAX_DEPTH as usize);
    assert_eq!(stats.bounces[0].active, WIDTH * HEIGHT);

    for (i, bounce) in stats.bounces.iter().enumerate() {
        assert_eq!(bounce.depth, i as u32);
        assert!(bounce.active <= ctx.capacity());
        match bounce.compaction {
            Some(c) => {
                assert!(c.surviving + c.diffuse <= bounce.active);
                assert!(c.next_active <= ctx.capacity());
            }
            None => assert_eq!(i as u32, MAX_DEPTH - 1),
        }
    }
}

#[test]
fn test_static_scene_converges() {
    let Some(mut ctx) = demo_context() else {
        return;
    };
    let mut snapshots = Vec::new();
    for sample in 1..=32u32 {
        ctx.render_sample().unwrap();
        if sample.is_power_of_two() {
            snapshots.push(ctx.read_accumulation().unwrap());
        }
    }
    // Snapshots at 1, 2, 4, 8, 16, 32 samples
    let steps: Vec<f32> = snapshots.windows(2).map(|w| mean_abs_diff(&w[1], &w[0])).collect();
    assert!(steps[0] > 0.0, "scene renders nothing");
    for pair in steps.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-3, "step change grew: {steps:?}");
    }
    assert!(steps[steps.len() - 1] < steps[0], "no convergence: {steps:?}");
    assert!(snapshots.iter().flatten().all(|c| c.is_finite()));
}

#[test]
fn test_clear_accumulation_restarts() {
    let Some(mut ctx) = demo_context() else {
        return;
    };
    for _ in 0..4 {
        ctx.render_sample().unwrap();
    }
    assert_eq!(ctx.sample_count(), 4);

    // With nothing to hit, one sample is ambient everywhere; a full replace
    // leaves no trace of the four samples before it
    ctx.load_geometry(&[]).unwrap();
    ctx.load_emitters(&[]).unwrap();
    ctx.clear_accumulation();
    assert_eq!(ctx.sample_count(), 0);
    let stats = ctx.render_sample().unwrap();
    assert_eq!(stats.sample, 1);
    assert_eq!(stats.blend_weight, 1.0);

    let options = ProgramOptions::default();
    let ambient = (options.ambient * options.color_scale).trunc() / options.color_scale;
    let estimate = ctx.read_accumulation().unwrap();
    for (i, c) in estimate.iter().enumerate() {
        assert!((*c - Vec3::splat(ambient)).abs().max_element() < 1e-6, "pixel {i}: {c:?}");
    }

    ctx.update_motion();
    assert_eq!(ctx.sample_count(), 0);
}

#[test]
fn test_oversized_resolution_is_an_error() {
    let Some(session) = try_session() else {
        return;
    };
    let width = session.limits().max_texture_dimension_2d + 1;
    let result = RenderContext::new(session, width, 1, ProgramOptions::default());
    assert!(matches!(result, Err(Error::InvalidResolution { height: 1, .. })));
}

#[test]
fn test_presentation_image() {
    let Some(mut ctx) = demo_context() else {
        return;
    };
    ctx.render_sample().unwrap();
    let pixels = ctx.read_image().unwrap();
    assert_eq!(pixels.len(), (WIDTH * HEIGHT * 4) as usize);
    assert!(pixels.chunks_exact(4).all(|p| p[3] == 255));
    assert!(pixels.chunks_exact(4).any(|p| p[0] > 0 || p[1] > 0 || p[2] > 0));
}

#[test]
fn test_geometry_limits() {
    let Some(mut ctx) = demo_context() else {
        return;
    };
    let shape = DemoScene::new().shapes().unwrap()[0];
    let too_many: Vec<Shape> = vec![shape; MAX_OBJECTS + 1];
    assert!(matches!(ctx.load_geometry(&too_many), Err(Error::InvalidGeometry(_))));

    // An empty scene still renders: every ray misses
    ctx.load_geometry(&[]).unwrap();
    ctx.load_emitters(&[]).unwrap();
    let stats = ctx.render_sample().unwrap();
    assert_eq!(stats.bounces.len(), 1);
    ctx.dispose().unwrap();
}
