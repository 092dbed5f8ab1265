//! Stream compaction between bounce depths.
//!
//! Each hit is classified by `intersect` as a survivor (one specular
//! continuation) or a diffuse request. A two-channel work-efficient exclusive
//! scan over those flags gives every survivor its compacted slot and every
//! diffuse request its rank. The totals decide how many diffuse children each
//! request may spawn without overflowing the ray buffers:
//!
//! ```text
//! factor      = min((capacity - surviving) / diffuse, MAX_DIFFUSE_RAYS)
//! next_active = surviving + factor * diffuse
//! ```
//!
//! Survivors land at `[0, surviving)`, children of request `r` at
//! `surviving + r * factor + k`.

use byteorder::{ByteOrder, LittleEndian};

use crate::device::{Arg, BufferId, KernelId, Runtime, WorkRange};
use crate::util::{ceil_pow2_exp, next_pow2, Result};

/// Most diffuse children a single hit may spawn.
pub const MAX_DIFFUSE_RAYS: u32 = 2;

/// Scan length for `n` active rays.
///
/// Never below 2 so that the root round of the up-sweep always runs and
/// publishes the totals.
pub fn padded_len(n: u32) -> u32 {
    next_pow2(n).max(2)
}

/// Diffuse children per request that still fit in `capacity`.
pub fn expansion_factor(capacity: u32, surviving: u32, diffuse: u32) -> u32 {
    if diffuse == 0 {
        return 0;
    }
    (capacity.saturating_sub(surviving) / diffuse).min(MAX_DIFFUSE_RAYS)
}

/// Result of one compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactionOutcome {
    /// Rays continuing as a single specular segment.
    pub surviving: u32,
    /// Hits requesting a diffuse bounce.
    pub diffuse: u32,
    /// Diffuse children spawned per request.
    pub factor: u32,
    /// Active rays at the next depth, never above the capacity.
    pub next_active: u32,
}

impl CompactionOutcome {
    /// Outcome for the scan totals read back from the device.
    pub fn resolve(capacity: u32, surviving: u32, diffuse: u32) -> Self {
        let factor = expansion_factor(capacity, surviving, diffuse);
        Self {
            surviving,
            diffuse,
            factor,
            next_active: surviving + factor * diffuse,
        }
    }
}

// ============================================================================
// Scan schedule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    UpSweep,
    DownSweep,
}

/// One sweep round: a single launch followed by a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStage {
    pub phase: ScanPhase,
    pub level: u32,
    /// Tree nodes combined this round, `padded >> (level + 1)`.
    pub work_items: u32,
}

impl ScanStage {
    /// Element pair combined by work item `k`.
    pub fn slots(&self, k: u32) -> (u32, u32) {
        sweep_slots(self.level, k)
    }
}

/// `(left, right)` elements combined by item `k` of round `level`.
pub fn sweep_slots(level: u32, k: u32) -> (u32, u32) {
    let stride = 2u32 << level;
    let half = 1u32 << level;
    (k * stride + half - 1, k * stride + stride - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    UpSweeping(u32),
    DownSweeping(u32),
    Done,
}

/// Round sequence of an exclusive scan over `padded` elements:
/// up-sweep levels `0..L`, then down-sweep levels `L-1..=0`.
#[derive(Debug, Clone)]
pub struct ScanSchedule {
    padded: u32,
    levels: u32,
    state: ScanState,
}

impl ScanSchedule {
    /// `padded` must be a power of two `>= 2`.
    pub fn new(padded: u32) -> Self {
        debug_assert!(padded >= 2 && padded.is_power_of_two());
        Self {
            padded,
            levels: ceil_pow2_exp(padded),
            state: ScanState::UpSweeping(0),
        }
    }

    pub fn padded(&self) -> u32 {
        self.padded
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    fn stage(&self, phase: ScanPhase, level: u32) -> ScanStage {
        ScanStage {
            phase,
            level,
            work_items: self.padded >> (level + 1),
        }
    }
}

impl Iterator for ScanSchedule {
    type Item = ScanStage;

    fn next(&mut self) -> Option<ScanStage> {
        match self.state {
            ScanState::UpSweeping(level) => {
                self.state = if level + 1 < self.levels {
                    ScanState::UpSweeping(level + 1)
                } else {
                    ScanState::DownSweeping(self.levels - 1)
                };
                Some(self.stage(ScanPhase::UpSweep, level))
            }
            ScanState::DownSweeping(level) => {
                self.state = match level {
                    0 => ScanState::Done,
                    _ => ScanState::DownSweeping(level - 1),
                };
                Some(self.stage(ScanPhase::DownSweep, level))
            }
            ScanState::Done => None,
        }
    }
}

// ============================================================================
// Host mirror
// ============================================================================

/// Host execution of the same schedule the kernels run.
///
/// Produces the exclusive scan of both channels and their totals exactly as
/// `prepare`/`sweep_up`/`sweep_down` leave them on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostScan {
    pub scan: Vec<[u32; 2]>,
    pub totals: [u32; 2],
}

impl HostScan {
    pub fn run(flags: &[[u32; 2]]) -> Self {
        let padded = padded_len(flags.len() as u32);
        let mut scan = vec![[0u32; 2]; padded as usize];
        for (slot, flag) in scan.iter_mut().zip(flags) {
            *slot = [flag[0].min(1), flag[1].min(1)];
        }

        let mut totals = [0u32; 2];
        for stage in ScanSchedule::new(padded) {
            for k in 0..stage.work_items {
                let (l, r) = stage.slots(k);
                let (l, r) = (l as usize, r as usize);
                match stage.phase {
                    ScanPhase::UpSweep => {
                        let sum = [scan[r][0] + scan[l][0], scan[r][1] + scan[l][1]];
                        if 2 << stage.level == padded {
                            totals = sum;
                            scan[r] = [0, 0];
                        } else {
                            scan[r] = sum;
                        }
                    }
                    ScanPhase::DownSweep => {
                        let carry = scan[l];
                        scan[l] = scan[r];
                        scan[r] = [scan[r][0] + carry[0], scan[r][1] + carry[1]];
                    }
                }
            }
        }

        scan.truncate(flags.len());
        Self { scan, totals }
    }
}

// ============================================================================
// Device engine
// ============================================================================

/// Runs compaction on the device for a fixed ray capacity.
#[derive(Debug, Clone, Copy)]
pub struct CompactionEngine {
    capacity: u32,
}

impl CompactionEngine {
    pub fn new(capacity: u32) -> Self {
        Self { capacity }
    }

    /// Ray slots available to the next depth.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Compact the `active` rays whose hits were just classified and spawn
    /// the next depth's diffuse rays.
    ///
    /// Blocks once, to read the scan totals back.
    #[tracing::instrument(skip(self, rt), fields(capacity = self.capacity))]
    pub fn run(&self, rt: &mut Runtime, active: u32, depth: i32) -> Result<CompactionOutcome> {
        if active == 0 {
            return Ok(CompactionOutcome::default());
        }
        let padded = padded_len(active);

        rt.launch(
            KernelId::Prepare,
            WorkRange::Linear(padded),
            &[
                Arg::Buffer(BufferId::HitInfo),
                Arg::Buffer(BufferId::ScanBuffer),
                Arg::Int(active as i32),
                Arg::Int(padded as i32),
            ],
        )?;
        rt.flush();

        for stage in ScanSchedule::new(padded) {
            let range = WorkRange::Linear(stage.work_items);
            match stage.phase {
                ScanPhase::UpSweep => rt.launch(
                    KernelId::SweepUp,
                    range,
                    &[
                        Arg::Buffer(BufferId::ScanBuffer),
                        Arg::Buffer(BufferId::RayCount),
                        Arg::Int(stage.level as i32),
                        Arg::Int(padded as i32),
                    ],
                )?,
                ScanPhase::DownSweep => rt.launch(
                    KernelId::SweepDown,
                    range,
                    &[
                        Arg::Buffer(BufferId::ScanBuffer),
                        Arg::Int(stage.level as i32),
                        Arg::Int(padded as i32),
                    ],
                )?,
            }
            rt.flush();
        }

        let counts = rt.load(BufferId::RayCount, 0, 8)?;
        let surviving = LittleEndian::read_u32(&counts[0..4]);
        let diffuse = LittleEndian::read_u32(&counts[4..8]);
        let outcome = CompactionOutcome::resolve(self.capacity, surviving, diffuse);
        tracing::trace!(
            "depth {}: {} active -> {} surviving + {} x {} diffuse",
            depth,
            active,
            surviving,
            outcome.factor,
            diffuse
        );

        rt.launch(
            KernelId::Expand,
            WorkRange::Linear(active),
            &[
                Arg::Buffer(BufferId::HitData),
                Arg::Buffer(BufferId::HitInfo),
                Arg::Buffer(BufferId::ScanBuffer),
                Arg::Buffer(BufferId::RayData),
                Arg::Buffer(BufferId::Random),
                Arg::Int(outcome.factor as i32),
                Arg::Int(active as i32),
                Arg::Int(outcome.surviving as i32),
                Arg::Int(depth + 1),
            ],
        )?;
        rt.flush();

        Ok(outcome)
    }
}
