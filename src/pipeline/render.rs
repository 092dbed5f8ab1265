//! Frame render orchestrator.
//!
//! A [`RenderContext`] owns the device runtime and every piece of pipeline
//! state. Each [`RenderContext::render_sample`] call traces one progressive
//! sample:
//!
//! 1. stage the camera record, launch `start` over the pixel grid
//! 2. up to [`MAX_DEPTH`] bounces of `intersect`, compaction (all but the
//!    last bounce) and `produce`
//! 3. `draw` the sample into the running estimate, `clear` the color buffer
//!
//! and returns once the presentation image is fully written.

use byteorder::{ByteOrder, LittleEndian};
use smallvec::SmallVec;

use crate::device::{
    Arg, BufferId, BufferSizes, KernelId, PresentationImage, ProgramOptions, Runtime, Session, WorkRange,
};
use crate::pipeline::{CompactionEngine, CompactionOutcome, SampleCounter};
use crate::record::{encode_all, CameraRecord, Hit, HitInfo, IndexRecord, Ray, Record};
use crate::scene::{
    build_index, flatten, validate_scene, CameraRig, Shape, MAX_EMITTERS, MAX_OBJECTS, SHAPE_FLOATS,
};
use crate::util::{next_pow2, Error, Result, Vec3};

/// Ray slots reserved per pixel.
pub const RAYS_PER_PIXEL: u32 = 4;
/// Bounces traced per sample.
pub const MAX_DEPTH: u32 = 3;

const SEED_MUL: u32 = 3_942_082_377;
const SEED_ADD: u32 = 1_234_567;

/// Ray capacity for a resolution: next power of two of `pixels * RAYS_PER_PIXEL`.
pub fn ray_capacity(width: u32, height: u32) -> Result<u32> {
    let invalid = || Error::InvalidResolution { width, height };
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    let slots = width
        .checked_mul(height)
        .and_then(|p| p.checked_mul(RAYS_PER_PIXEL))
        .ok_or_else(invalid)?;
    if slots > 1 << 31 {
        return Err(invalid());
    }
    Ok(next_pow2(slots))
}

/// Reject resolutions the presentation image cannot have on this device.
pub fn check_resolution(width: u32, height: u32, limits: &wgpu::Limits) -> Result<()> {
    let max = limits.max_texture_dimension_2d;
    if width > max || height > max {
        tracing::warn!("Resolution {}x{} exceeds the device texture limit {}", width, height, max);
        return Err(Error::InvalidResolution { width, height });
    }
    Ok(())
}

/// Byte size of every buffer for a resolution and ray capacity.
pub fn buffer_sizes(width: u32, height: u32, capacity: u32) -> BufferSizes {
    let pixels = u64::from(width) * u64::from(height);
    let slots = u64::from(capacity);
    let word = 4u64;
    BufferSizes::new([
        (BufferId::RayData, slots * Ray::SIZE as u64),
        (BufferId::HitData, slots * Hit::SIZE as u64),
        (BufferId::HitInfo, slots * HitInfo::SIZE as u64),
        // Capacity is a power of two, so it is its own padded scan length
        (BufferId::ScanBuffer, slots * 2 * word),
        (BufferId::Random, slots * word),
        (BufferId::Camera, CameraRecord::SIZE as u64),
        (BufferId::ColorBuffer, pixels * 3 * word),
        (BufferId::AccumBuffer, pixels * 3 * word),
        (BufferId::RayCount, 2 * word),
        (BufferId::Index, (MAX_OBJECTS * IndexRecord::SIZE) as u64),
        (BufferId::Shapes, (MAX_OBJECTS * SHAPE_FLOATS) as u64 * word),
        (BufferId::Emitters, (MAX_EMITTERS * SHAPE_FLOATS) as u64 * word),
    ])
}

/// Initial per-slot random state.
pub fn seed_random(count: u32) -> Vec<u32> {
    let mut seed = 0u32;
    (0..count)
        .map(|_| {
            seed = seed.wrapping_mul(SEED_MUL).wrapping_add(SEED_ADD);
            seed
        })
        .collect()
}

/// Active rays and compaction result of one bounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BounceStats {
    /// Bounce depth, `0` for primary rays.
    pub depth: u32,
    /// Rays intersected and shaded at this depth.
    pub active: u32,
    /// `None` on the last bounce, which is never compacted.
    pub compaction: Option<CompactionOutcome>,
}

/// Summary of one rendered sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    /// Samples accumulated since the last clear, this one included.
    pub sample: u32,
    /// Weight `draw` gave this sample in the running estimate.
    pub blend_weight: f32,
    /// One entry per traced bounce; fewer than [`MAX_DEPTH`] when rays run out.
    pub bounces: SmallVec<[BounceStats; MAX_DEPTH as usize]>,
}

impl FrameStats {
    /// Rays traced over all bounces.
    pub fn rays_traced(&self) -> u64 {
        self.bounces.iter().map(|b| u64::from(b.active)).sum()
    }
}

/// Owned progressive renderer state.
#[derive(Debug)]
pub struct RenderContext {
    rt: Runtime,
    width: u32,
    height: u32,
    compaction: CompactionEngine,
    samples: SampleCounter,
    camera: CameraRig,
    object_count: u32,
    emitter_count: u32,
}

impl RenderContext {
    /// Allocate buffers, compile kernels and seed the random state.
    #[tracing::instrument(skip(session, options))]
    pub fn new(session: Session, width: u32, height: u32, options: ProgramOptions) -> Result<Self> {
        let capacity = ray_capacity(width, height)?;
        check_resolution(width, height, &session.limits())?;
        let sizes = buffer_sizes(width, height, capacity);
        tracing::info!(
            "Render context {}x{}: {} ray slots, {:.1} MiB of buffers",
            width,
            height,
            capacity,
            sizes.total() as f64 / (1024.0 * 1024.0)
        );

        let mut rt = Runtime::new(session, sizes, options, width, height)?;
        let seeds = seed_random(capacity);
        rt.store(BufferId::Random, 0, bytemuck::cast_slice(&seeds))?;
        rt.clear(BufferId::AccumBuffer)?;
        rt.clear(BufferId::ColorBuffer)?;
        rt.wait()?;

        Ok(Self {
            rt,
            width,
            height,
            compaction: CompactionEngine::new(capacity),
            samples: SampleCounter::new(),
            camera: CameraRig::default(),
            object_count: 0,
            emitter_count: 0,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Ray slots shared by the ray, hit and hit-info buffers.
    pub fn capacity(&self) -> u32 {
        self.compaction.capacity()
    }

    /// Device session the context renders on.
    pub fn session(&self) -> &Session {
        &self.rt.session
    }

    /// Replace the scene objects and rebuild their index.
    #[tracing::instrument(skip_all, fields(objects = shapes.len()))]
    pub fn load_geometry(&mut self, shapes: &[Shape]) -> Result<()> {
        validate_scene(shapes, MAX_OBJECTS, "object")?;
        let index = build_index(shapes);
        for entry in &index {
            tracing::debug!(
                "object {} ({:?}): center {:?}, radius {:.3}",
                entry.id,
                entry.kind,
                entry.center,
                entry.radius
            );
        }
        self.rt.store(BufferId::Index, 0, &encode_all(&index))?;
        self.rt
            .store(BufferId::Shapes, 0, bytemuck::cast_slice(&flatten(shapes)))?;
        self.rt.wait()?;
        self.object_count = shapes.len() as u32;
        Ok(())
    }

    /// Replace the light sources sampled during shading.
    pub fn load_emitters(&mut self, emitters: &[Shape]) -> Result<()> {
        validate_scene(emitters, MAX_EMITTERS, "emitter")?;
        self.rt
            .store(BufferId::Emitters, 0, bytemuck::cast_slice(&flatten(emitters)))?;
        self.rt.wait()?;
        self.emitter_count = emitters.len() as u32;
        Ok(())
    }

    /// Restart accumulation: the next sample fully replaces the estimate.
    pub fn clear_accumulation(&mut self) {
        self.samples.reset();
    }

    /// Camera used by the next sample.
    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    /// Camera changes take effect on the next sample; call
    /// [`RenderContext::update_motion`] or
    /// [`RenderContext::clear_accumulation`] afterwards.
    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    /// Start a new motion interval from the current pose and restart
    /// accumulation.
    pub fn update_motion(&mut self) {
        self.camera.commit_motion();
        self.clear_accumulation();
    }

    /// Samples blended since the last clear.
    pub fn sample_count(&self) -> u32 {
        self.samples.count()
    }

    /// Presentation image, fully written once `render_sample` returns.
    pub fn image(&self) -> &PresentationImage {
        &self.rt.image
    }

    /// Trace one progressive sample. Any error is fatal for the context.
    #[tracing::instrument(skip_all, fields(sample = self.samples.count() + 1))]
    pub fn render_sample(&mut self) -> Result<FrameStats> {
        self.rt.session.push_error_scope();
        let result = self.trace_sample();
        let scope = self.rt.session.pop_error_scope();
        let stats = result?;
        scope?;
        Ok(stats)
    }

    fn trace_sample(&mut self) -> Result<FrameStats> {
        let (width, height) = (self.width, self.height);
        let grid = WorkRange::Grid(width, height);

        let mut camera = vec![0u8; CameraRecord::SIZE];
        self.camera.record().encode(&mut camera);
        self.rt.store(BufferId::Camera, 0, &camera)?;

        self.rt.launch(
            KernelId::Start,
            grid,
            &[
                Arg::Buffer(BufferId::RayData),
                Arg::Buffer(BufferId::Camera),
                Arg::Buffer(BufferId::Random),
            ],
        )?;
        self.rt.flush();

        let mut bounces = SmallVec::new();
        let mut active = width * height;
        for depth in 0..MAX_DEPTH {
            if active == 0 {
                break;
            }
            let work = active;

            self.rt.launch(
                KernelId::Intersect,
                WorkRange::Linear(work),
                &[
                    Arg::Buffer(BufferId::Shapes),
                    Arg::Buffer(BufferId::Index),
                    Arg::Buffer(BufferId::RayData),
                    Arg::Buffer(BufferId::HitData),
                    Arg::Buffer(BufferId::HitInfo),
                    Arg::Buffer(BufferId::Random),
                    Arg::Int(work as i32),
                    Arg::Int(self.object_count as i32),
                ],
            )?;
            self.rt.flush();

            let compaction = if depth + 1 < MAX_DEPTH {
                let outcome = self.compaction.run(&mut self.rt, work, depth as i32)?;
                active = outcome.next_active;
                Some(outcome)
            } else {
                active = 0;
                None
            };

            self.rt.launch(
                KernelId::Produce,
                WorkRange::Linear(work),
                &[
                    Arg::Buffer(BufferId::HitData),
                    Arg::Buffer(BufferId::HitInfo),
                    Arg::Buffer(BufferId::Emitters),
                    Arg::Buffer(BufferId::Shapes),
                    Arg::Buffer(BufferId::Index),
                    Arg::Buffer(BufferId::ColorBuffer),
                    Arg::Buffer(BufferId::Random),
                    Arg::Int(width as i32),
                    Arg::Int(work as i32),
                    Arg::Int(self.object_count as i32),
                    Arg::Int(self.emitter_count as i32),
                ],
            )?;
            self.rt.flush();

            bounces.push(BounceStats {
                depth,
                active: work,
                compaction,
            });
        }

        let mul = self.samples.advance();
        self.rt.launch(
            KernelId::Draw,
            grid,
            &[
                Arg::Buffer(BufferId::ColorBuffer),
                Arg::Buffer(BufferId::AccumBuffer),
                Arg::Image,
                Arg::Float(mul),
            ],
        )?;
        self.rt
            .launch(KernelId::Clear, grid, &[Arg::Buffer(BufferId::ColorBuffer)])?;
        self.rt.wait()?;

        Ok(FrameStats {
            sample: self.samples.count(),
            blend_weight: mul,
            bounces,
        })
    }

    /// Current per-pixel estimate, row-major.
    pub fn read_accumulation(&mut self) -> Result<Vec<Vec3>> {
        let len = self.rt.buffers.size(BufferId::AccumBuffer);
        let bytes = self.rt.load(BufferId::AccumBuffer, 0, len)?;
        let pixels = (self.width * self.height) as usize;
        Ok(bytes
            .chunks_exact(12)
            .take(pixels)
            .map(|c| {
                Vec3::new(
                    LittleEndian::read_f32(&c[0..4]),
                    LittleEndian::read_f32(&c[4..8]),
                    LittleEndian::read_f32(&c[8..12]),
                )
            })
            .collect())
    }

    /// Presentation image as tightly packed RGBA8 rows.
    pub fn read_image(&mut self) -> Result<Vec<u8>> {
        self.rt.image.read_pixels(&mut self.rt.session)
    }

    /// Drain the queue and release every device resource.
    pub fn dispose(mut self) -> Result<()> {
        self.rt.wait()?;
        tracing::debug!("Render context disposed after {} samples", self.samples.count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_capacity() {
        assert_eq!(ray_capacity(800, 600).unwrap(), 1 << 21);
        assert_eq!(ray_capacity(4, 4).unwrap(), 64);
        assert_eq!(ray_capacity(3, 1).unwrap(), 16);
        assert!(matches!(
            ray_capacity(0, 600),
            Err(Error::InvalidResolution { width: 0, height: 600 })
        ));
        assert!(ray_capacity(u32::MAX, 2).is_err());
        assert!(ray_capacity(65536, 65536).is_err());
    }

    #[test]
    fn test_check_resolution_texture_limit() {
        let limits = wgpu::Limits::default();
        let max = limits.max_texture_dimension_2d;
        assert!(check_resolution(max, max, &limits).is_ok());
        assert!(matches!(
            check_resolution(max + 1, 1, &limits),
            Err(Error::InvalidResolution { height: 1, .. })
        ));
        assert!(check_resolution(1, max + 1, &limits).is_err());
        // Accepted by the capacity rule, rejected by the texture limit
        assert!(ray_capacity(40_000, 1).is_ok());
        assert!(check_resolution(40_000, 1, &limits).is_err());
    }

    #[test]
    fn test_buffer_sizes() {
        let cap = ray_capacity(8, 4).unwrap();
        let sizes = buffer_sizes(8, 4, cap);
        assert_eq!(sizes.get(BufferId::RayData), 128 * 56);
        assert_eq!(sizes.get(BufferId::HitData), 128 * 64);
        assert_eq!(sizes.get(BufferId::ScanBuffer), 128 * 8);
        assert_eq!(sizes.get(BufferId::ColorBuffer), 32 * 12);
        assert_eq!(sizes.get(BufferId::Camera), 108);
        assert_eq!(sizes.get(BufferId::RayCount), 8);
    }

    #[test]
    fn test_seed_sequence() {
        let seeds = seed_random(3);
        assert_eq!(seeds[0], 1_234_567);
        assert_eq!(seeds[1], 1_234_567u32.wrapping_mul(SEED_MUL).wrapping_add(SEED_ADD));
        assert_eq!(seed_random(0).len(), 0);
    }
}
