//! Named device buffers and host transfers.
//!
//! Every buffer the pipeline uses is allocated once at context creation with
//! a fixed size and looked up by [`BufferId`]. Stores are staged on the queue
//! and take effect in queue order; loads flush, copy through a staging buffer
//! and block until the bytes are on the host.

use std::sync::mpsc;

use crate::device::Session;
use crate::util::{Error, Result};

/// Copy alignment for every store/load/clear.
pub const TRANSFER_ALIGN: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// Bytes moved per staging round trip on readback.
const STAGING_CHUNK: u64 = 4 << 20;

/// Identity of a fixed-size device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferId {
    /// Ray records, one slot per in-flight ray.
    RayData,
    /// Hit records, one slot per in-flight ray.
    HitData,
    /// One camera record.
    Camera,
    /// Fixed-point per-pixel radiance of the current sample (3 x i32).
    ColorBuffer,
    /// Per-pixel running average (3 x f32).
    AccumBuffer,
    /// Compaction flags, one slot per in-flight ray.
    HitInfo,
    /// Two-channel prefix-scan workspace.
    ScanBuffer,
    /// Scan totals: surviving rays, diffuse requests.
    RayCount,
    /// Per-slot random state.
    Random,
    /// Object bounding spheres.
    Index,
    /// Object vertices, 18 floats per object.
    Shapes,
    /// Object slots that emit light.
    Emitters,
}

impl BufferId {
    pub const ALL: [BufferId; 12] = [
        BufferId::RayData,
        BufferId::HitData,
        BufferId::Camera,
        BufferId::ColorBuffer,
        BufferId::AccumBuffer,
        BufferId::HitInfo,
        BufferId::ScanBuffer,
        BufferId::RayCount,
        BufferId::Random,
        BufferId::Index,
        BufferId::Shapes,
        BufferId::Emitters,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BufferId::RayData => "ray_data",
            BufferId::HitData => "hit_data",
            BufferId::Camera => "camera",
            BufferId::ColorBuffer => "color_buffer",
            BufferId::AccumBuffer => "accum_buffer",
            BufferId::HitInfo => "hit_info",
            BufferId::ScanBuffer => "scan_buffer",
            BufferId::RayCount => "ray_count",
            BufferId::Random => "random",
            BufferId::Index => "index",
            BufferId::Shapes => "shapes",
            BufferId::Emitters => "emitters",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte size of every buffer, decided once per context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSizes([u64; 12]);

impl BufferSizes {
    pub fn new(sizes: impl IntoIterator<Item = (BufferId, u64)>) -> Self {
        let mut out = [TRANSFER_ALIGN; 12];
        for (id, size) in sizes {
            // wgpu rejects zero-sized bindings
            out[id.slot()] = size.max(TRANSFER_ALIGN).next_multiple_of(TRANSFER_ALIGN);
        }
        Self(out)
    }

    pub fn get(&self, id: BufferId) -> u64 {
        self.0[id.slot()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Check every buffer against the device binding and allocation limits.
    pub fn check_limits(&self, limits: &wgpu::Limits) -> Result<()> {
        let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        for id in BufferId::ALL {
            let size = self.get(id);
            if size > limit {
                return Err(Error::CapacityExceeded {
                    buffer: id.name(),
                    size,
                    limit,
                });
            }
        }
        Ok(())
    }
}

/// Validate a transfer window against alignment and the buffer size.
pub fn check_transfer(id: BufferId, offset: u64, len: u64, size: u64) -> Result<()> {
    if offset % TRANSFER_ALIGN != 0 || len % TRANSFER_ALIGN != 0 {
        return Err(Error::Misaligned {
            buffer: id.name(),
            offset,
            len,
            align: TRANSFER_ALIGN,
        });
    }
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::OutOfRange {
            buffer: id.name(),
            offset,
            len,
            size,
        }),
    }
}

/// The context's fixed buffer set.
///
/// Transfers are queued on the [`Session`] passed to each call, the one queue
/// every launch of the context also uses.
pub struct BufferRegistry {
    buffers: Vec<wgpu::Buffer>,
    sizes: BufferSizes,
    staging: wgpu::Buffer,
}

impl BufferRegistry {
    /// Allocate every buffer. Contents start zeroed.
    #[tracing::instrument(skip_all, fields(total_bytes = sizes.total()))]
    pub fn allocate(session: &Session, sizes: BufferSizes) -> Result<Self> {
        sizes.check_limits(&session.limits())?;

        let device = session.device();
        let buffers = BufferId::ALL
            .iter()
            .map(|&id| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(id.name()),
                    size: sizes.get(id),
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: STAGING_CHUNK,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        for id in BufferId::ALL {
            tracing::debug!("Allocated {} ({} bytes)", id, sizes.get(id));
        }

        Ok(Self {
            buffers,
            sizes,
            staging,
        })
    }

    pub fn get(&self, id: BufferId) -> &wgpu::Buffer {
        &self.buffers[id.slot()]
    }

    pub fn size(&self, id: BufferId) -> u64 {
        self.sizes.get(id)
    }

    pub fn sizes(&self) -> &BufferSizes {
        &self.sizes
    }

    /// Stage a write of `data` at `offset`.
    ///
    /// Pending launches are submitted first, so the write lands after every
    /// previously queued launch and before any later one.
    pub fn store(&self, session: &mut Session, id: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        check_transfer(id, offset, data.len() as u64, self.size(id))?;
        if data.is_empty() {
            return Ok(());
        }
        session.flush();
        session.queue().write_buffer(self.get(id), offset, data);
        Ok(())
    }

    /// Read `len` bytes at `offset`, blocking until all prior work completes.
    #[tracing::instrument(skip(self, session), fields(buffer = id.name()))]
    pub fn load(&self, session: &mut Session, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>> {
        check_transfer(id, offset, len, self.size(id))?;
        let mut out = Vec::with_capacity(len as usize);
        let mut done = 0u64;

        while done < len {
            let chunk = (len - done).min(STAGING_CHUNK);
            let mut encoder = session.encoder("readback");
            encoder.copy_buffer_to_buffer(self.get(id), offset + done, &self.staging, 0, chunk);
            session.enqueue(encoder.finish());
            session.flush();

            let slice = self.staging.slice(..chunk);
            let (tx, rx) = mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            session
                .device()
                .poll(wgpu::PollType::wait_indefinitely())
                .map_err(|e| Error::Poll(e.to_string()))?;
            rx.recv()
                .map_err(|e| Error::Map(e.to_string()))?
                .map_err(|e| Error::Map(e.to_string()))?;

            out.extend_from_slice(&slice.get_mapped_range());
            self.staging.unmap();
            done += chunk;
        }

        Ok(out)
    }

    /// Queue a zero fill of `len` bytes at `offset`.
    pub fn clear(&self, session: &mut Session, id: BufferId, offset: u64, len: u64) -> Result<()> {
        check_transfer(id, offset, len, self.size(id))?;
        let mut encoder = session.encoder("clear");
        encoder.clear_buffer(self.get(id), offset, Some(len));
        session.enqueue(encoder.finish());
        Ok(())
    }

    /// Queue a zero fill of the whole buffer.
    pub fn clear_all(&self, session: &mut Session, id: BufferId) -> Result<()> {
        self.clear(session, id, 0, self.size(id))
    }
}

impl std::fmt::Debug for BufferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRegistry").field("sizes", &self.sizes).finish()
    }
}
