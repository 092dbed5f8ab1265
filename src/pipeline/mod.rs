//! Per-sample pipeline: orchestration, stream compaction, accumulation.

mod accumulation;
mod compaction;
mod render;

pub use accumulation::{blend, blend_weight, effective_sample_index, tonemap, SampleCounter};
pub use compaction::{
    expansion_factor, padded_len, sweep_slots, CompactionEngine, CompactionOutcome, HostScan, ScanPhase,
    ScanSchedule, ScanStage, ScanState, MAX_DIFFUSE_RAYS,
};
pub use render::{
    buffer_sizes, check_resolution, ray_capacity, seed_random, BounceStats, FrameStats, RenderContext, MAX_DEPTH,
    RAYS_PER_PIXEL,
};
