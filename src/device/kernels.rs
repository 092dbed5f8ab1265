//! Compute kernel set: program assembly, pipelines and launches.
//!
//! Each kernel is its own WGSL module: generated constants, the shared
//! prelude, then the kernel body. Buffer and image arguments bind to
//! `@binding(0..k)` in positional order; scalar arguments are packed into a
//! [`LaunchParams`] uniform at `@binding(15)`, served from a ring with
//! dynamic offsets so that many launches can be queued between flushes.

use std::collections::HashMap;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;

use crate::device::{BufferId, BufferRegistry, PresentationImage, Session};
use crate::util::{div_ceil, Error, Result};

/// Binding slot of the per-launch parameter uniform.
pub const PARAMS_BINDING: u32 = 15;
/// Invocations per workgroup for 1-D kernels.
pub const LINEAR_WORKGROUP: u32 = 64;
/// Workgroup edge for 2-D kernels.
pub const GRID_WORKGROUP: u32 = 8;
/// Parameter slots in the uniform ring before a forced flush.
const PARAM_RING_SLOTS: u32 = 64;
/// Scalar words available to one launch.
pub const MAX_SCALARS: usize = 4;

const PRELUDE_WGSL: &str = include_str!("../kernels/prelude.wgsl");

// ============================================================================
// Kernel vocabulary
// ============================================================================

/// Kind of one positional kernel argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Buffer,
    Image,
    Int,
    Float,
}

/// Work shape a kernel is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Linear,
    Grid,
}

/// The fixed kernel vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KernelId {
    Start,
    Intersect,
    Prepare,
    SweepUp,
    SweepDown,
    Expand,
    Produce,
    Draw,
    Clear,
}

impl KernelId {
    pub const ALL: [KernelId; 9] = [
        KernelId::Start,
        KernelId::Intersect,
        KernelId::Prepare,
        KernelId::SweepUp,
        KernelId::SweepDown,
        KernelId::Expand,
        KernelId::Produce,
        KernelId::Draw,
        KernelId::Clear,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KernelId::Start => "start",
            KernelId::Intersect => "intersect",
            KernelId::Prepare => "prepare",
            KernelId::SweepUp => "sweep_up",
            KernelId::SweepDown => "sweep_down",
            KernelId::Expand => "expand",
            KernelId::Produce => "produce",
            KernelId::Draw => "draw",
            KernelId::Clear => "clear",
        }
    }

    /// Positional argument kinds, in call order.
    pub fn signature(self) -> &'static [Param] {
        use Param::*;
        match self {
            // ray, camera, random
            KernelId::Start => &[Buffer, Buffer, Buffer],
            // shapes, index, ray, hit, hit_info, random; work, object_count
            KernelId::Intersect => &[Buffer, Buffer, Buffer, Buffer, Buffer, Buffer, Int, Int],
            // hit_info, scan; work, padded
            KernelId::Prepare => &[Buffer, Buffer, Int, Int],
            // scan, ray_count; level, padded
            KernelId::SweepUp => &[Buffer, Buffer, Int, Int],
            // scan; level, padded
            KernelId::SweepDown => &[Buffer, Int, Int],
            // hit, hit_info, scan, ray, random; factor, work, surviving, depth
            KernelId::Expand => &[Buffer, Buffer, Buffer, Buffer, Buffer, Int, Int, Int, Int],
            // hit, hit_info, emitters, shapes, index, color, random;
            // width, work, object_count, emitter_count
            KernelId::Produce => &[
                Buffer, Buffer, Buffer, Buffer, Buffer, Buffer, Buffer, Int, Int, Int, Int,
            ],
            // color, accum, image; mul
            KernelId::Draw => &[Buffer, Buffer, Image, Float],
            // color
            KernelId::Clear => &[Buffer],
        }
    }

    pub fn dimension(self) -> Dimension {
        match self {
            KernelId::Start | KernelId::Draw | KernelId::Clear => Dimension::Grid,
            _ => Dimension::Linear,
        }
    }

    fn body(self) -> &'static str {
        match self {
            KernelId::Start => include_str!("../kernels/start.wgsl"),
            KernelId::Intersect => include_str!("../kernels/intersect.wgsl"),
            KernelId::Prepare => include_str!("../kernels/prepare.wgsl"),
            KernelId::SweepUp => include_str!("../kernels/sweep_up.wgsl"),
            KernelId::SweepDown => include_str!("../kernels/sweep_down.wgsl"),
            KernelId::Expand => include_str!("../kernels/expand.wgsl"),
            KernelId::Produce => include_str!("../kernels/produce.wgsl"),
            KernelId::Draw => include_str!("../kernels/draw.wgsl"),
            KernelId::Clear => include_str!("../kernels/clear.wgsl"),
        }
    }
}

impl FromStr for KernelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        KernelId::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownKernel(s.to_string()))
    }
}

impl std::fmt::Display for KernelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One positional launch argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg {
    Buffer(BufferId),
    /// The context's presentation image.
    Image,
    Int(i32),
    Float(f32),
}

impl Arg {
    fn param(&self) -> Param {
        match self {
            Arg::Buffer(_) => Param::Buffer,
            Arg::Image => Param::Image,
            Arg::Int(_) => Param::Int,
            Arg::Float(_) => Param::Float,
        }
    }
}

/// Launch range: a 1-D count or a 2-D width x height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkRange {
    Linear(u32),
    Grid(u32, u32),
}

impl WorkRange {
    pub fn is_empty(&self) -> bool {
        match *self {
            WorkRange::Linear(n) => n == 0,
            WorkRange::Grid(w, h) => w == 0 || h == 0,
        }
    }

    fn extent(&self) -> [u32; 2] {
        match *self {
            WorkRange::Linear(n) => [n, 1],
            WorkRange::Grid(w, h) => [w, h],
        }
    }

    /// Workgroup counts for this range, folding 1-D overflow into y.
    pub fn workgroups(&self, max_per_dim: u32) -> [u32; 2] {
        match *self {
            WorkRange::Linear(n) => {
                let groups = div_ceil(n, LINEAR_WORKGROUP);
                let x = groups.min(max_per_dim.max(1));
                [x, div_ceil(groups, x.max(1))]
            }
            WorkRange::Grid(w, h) => [div_ceil(w, GRID_WORKGROUP), div_ceil(h, GRID_WORKGROUP)],
        }
    }
}

/// Per-launch uniform block, mirrored by `LaunchParams` in the prelude.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct LaunchParams {
    pub range: [u32; 2],
    pub _pad: [u32; 2],
    pub args: [u32; 4],
}

// ============================================================================
// Program assembly
// ============================================================================

/// Constants baked into every kernel module.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramOptions {
    /// Fixed-point scale of the integer color buffer.
    pub color_scale: f32,
    /// Radiance of a directly seen emitter.
    pub emission: f32,
    /// Radiance of a ray that leaves the scene.
    pub ambient: f32,
    /// Per-contribution clamp, keeps the fixed-point sums from overflowing.
    pub max_radiance: f32,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            color_scale: 1024.0,
            emission: 6.0,
            ambient: 0.08,
            max_radiance: 64.0,
        }
    }
}

impl ProgramOptions {
    /// WGSL constant block for these options.
    pub fn defines(&self) -> String {
        format!(
            "const COLOR_SCALE: f32 = {:?};\n\
             const EMISSION: f32 = {:?};\n\
             const AMBIENT: f32 = {:?};\n\
             const MAX_RADIANCE: f32 = {:?};\n",
            self.color_scale, self.emission, self.ambient, self.max_radiance
        )
    }

    /// Full WGSL source for one kernel.
    pub fn source(&self, kernel: KernelId) -> String {
        let mut src = self.defines();
        src.push_str(PRELUDE_WGSL);
        src.push('\n');
        src.push_str(kernel.body());
        src
    }
}

/// Check positional arguments against a kernel signature.
pub fn check_args(kernel: KernelId, args: &[Arg]) -> Result<()> {
    let sig = kernel.signature();
    if args.len() != sig.len() {
        return Err(Error::ArgumentMismatch {
            kernel: kernel.name(),
            position: args.len().min(sig.len()),
            reason: format!("expected {} arguments, got {}", sig.len(), args.len()),
        });
    }
    for (position, (arg, param)) in args.iter().zip(sig).enumerate() {
        if arg.param() != *param {
            return Err(Error::ArgumentMismatch {
                kernel: kernel.name(),
                position,
                reason: format!("expected {:?}, got {:?}", param, arg.param()),
            });
        }
    }
    Ok(())
}

/// Pack the scalar arguments of a checked call.
pub fn pack_params(range: WorkRange, args: &[Arg]) -> LaunchParams {
    let mut params = LaunchParams {
        range: range.extent(),
        ..Zeroable::zeroed()
    };
    let scalars = args.iter().filter_map(|arg| match *arg {
        Arg::Int(v) => Some(v as u32),
        Arg::Float(v) => Some(v.to_bits()),
        _ => None,
    });
    for (slot, word) in params.args.iter_mut().zip(scalars) {
        *slot = word;
    }
    params
}

// ============================================================================
// Kernel set
// ============================================================================

struct Kernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

type BindKey = (KernelId, SmallVec<[BufferId; 8]>);

/// Every kernel compiled for one device, plus the launch machinery.
pub struct KernelSet {
    kernels: HashMap<KernelId, Kernel>,
    options: ProgramOptions,
    params: wgpu::Buffer,
    param_stride: u32,
    next_param: u32,
    bind_groups: HashMap<BindKey, wgpu::BindGroup>,
    max_groups: u32,
}

impl KernelSet {
    /// Compile every kernel; shader or pipeline errors surface as [`Error::Device`].
    #[tracing::instrument(skip_all)]
    pub fn load(session: &mut Session, options: ProgramOptions) -> Result<Self> {
        let kernels = session.scoped(|session| {
            let mut kernels = HashMap::new();
            for id in KernelId::ALL {
                kernels.insert(id, Self::build(session.device(), id, &options));
            }
            Ok(kernels)
        })?;

        let limits = session.limits();
        let param_stride = limits
            .min_uniform_buffer_offset_alignment
            .max(std::mem::size_of::<LaunchParams>() as u32);
        let params = session.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("launch_params"),
            size: u64::from(param_stride) * u64::from(PARAM_RING_SLOTS),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        tracing::debug!("Loaded {} kernels", kernels.len());
        Ok(Self {
            kernels,
            options,
            params,
            param_stride,
            next_param: 0,
            bind_groups: HashMap::new(),
            max_groups: limits.max_compute_workgroups_per_dimension,
        })
    }

    fn build(device: &wgpu::Device, id: KernelId, options: &ProgramOptions) -> Kernel {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(id.name()),
            source: wgpu::ShaderSource::Wgsl(options.source(id).into()),
        });

        let mut entries = Vec::new();
        let resources = id
            .signature()
            .iter()
            .filter(|p| matches!(p, Param::Buffer | Param::Image));
        for (binding, param) in resources.enumerate() {
            let ty = match param {
                Param::Image => wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: crate::device::image::IMAGE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                _ => wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
            };
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty,
                count: None,
            });
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: PARAMS_BINDING,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<LaunchParams>() as u64),
            },
            count: None,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(id.name()),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(id.name()),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(id.name()),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Kernel { pipeline, layout }
    }

    pub fn options(&self) -> &ProgramOptions {
        &self.options
    }

    /// Look a kernel up by its vocabulary name.
    pub fn kernel(&self, name: &str) -> Result<KernelId> {
        name.parse()
    }

    /// Queue one launch. Empty ranges are skipped.
    ///
    /// The launch runs after everything queued before it; results are
    /// visible to the host after [`Session::wait`].
    pub fn launch(
        &mut self,
        session: &mut Session,
        buffers: &BufferRegistry,
        image: &PresentationImage,
        kernel: KernelId,
        range: WorkRange,
        args: &[Arg],
    ) -> Result<()> {
        check_args(kernel, args)?;
        if range.is_empty() {
            tracing::trace!("Skipping empty launch of {}", kernel);
            return Ok(());
        }

        // A parameter slot may only be rewritten after the launches that
        // read it have been submitted.
        if self.next_param == PARAM_RING_SLOTS {
            session.flush();
            self.next_param = 0;
        }
        let offset = self.next_param * self.param_stride;
        self.next_param += 1;
        let params = pack_params(range, args);
        session
            .queue()
            .write_buffer(&self.params, u64::from(offset), bytemuck::bytes_of(&params));

        let key: BindKey = (
            kernel,
            args.iter()
                .filter_map(|a| match a {
                    Arg::Buffer(id) => Some(*id),
                    _ => None,
                })
                .collect(),
        );
        let Some(entry) = self.kernels.get(&kernel) else {
            return Err(Error::UnknownKernel(kernel.name().to_string()));
        };
        let bind_group = self.bind_groups.entry(key).or_insert_with(|| {
            let mut entries = Vec::new();
            let resources = args.iter().filter(|a| matches!(a, Arg::Buffer(_) | Arg::Image));
            for (binding, arg) in resources.enumerate() {
                let resource = match arg {
                    Arg::Buffer(id) => buffers.get(*id).as_entire_binding(),
                    _ => wgpu::BindingResource::TextureView(image.view()),
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource,
                });
            }
            entries.push(wgpu::BindGroupEntry {
                binding: PARAMS_BINDING,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.params,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<LaunchParams>() as u64),
                }),
            });
            session.device().create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kernel.name()),
                layout: &entry.layout,
                entries: &entries,
            })
        });

        let [x, y] = range.workgroups(self.max_groups);
        let mut encoder = session.encoder(kernel.name());
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&entry.pipeline);
            pass.set_bind_group(0, &*bind_group, &[offset]);
            pass.dispatch_workgroups(x, y, 1);
        }
        session.enqueue(encoder.finish());
        tracing::trace!("Queued {} over {:?} ({}x{} groups)", kernel, range, x, y);
        Ok(())
    }
}

impl std::fmt::Debug for KernelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSet")
            .field("kernels", &self.kernels.len())
            .field("options", &self.options)
            .field("bind_groups", &self.bind_groups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_lookup_by_name() {
        for id in KernelId::ALL {
            assert_eq!(id.name().parse::<KernelId>().unwrap(), id);
        }
        assert!(matches!("trace".parse::<KernelId>(), Err(Error::UnknownKernel(_))));
    }

    #[test]
    fn test_signatures_fit_bindings() {
        for id in KernelId::ALL {
            let sig = id.signature();
            let resources = sig.iter().filter(|p| matches!(p, Param::Buffer | Param::Image)).count();
            let scalars = sig.len() - resources;
            assert!(resources < PARAMS_BINDING as usize, "{id}");
            assert!(scalars <= MAX_SCALARS, "{id}");
        }
    }

    #[test]
    fn test_check_args() {
        let ok = [
            Arg::Buffer(BufferId::ScanBuffer),
            Arg::Int(0),
            Arg::Int(8),
        ];
        assert!(check_args(KernelId::SweepDown, &ok).is_ok());

        let swapped = [Arg::Int(0), Arg::Buffer(BufferId::ScanBuffer), Arg::Int(8)];
        let err = check_args(KernelId::SweepDown, &swapped).unwrap_err();
        assert!(matches!(err, Error::ArgumentMismatch { position: 0, .. }));

        let short = [Arg::Buffer(BufferId::ColorBuffer), Arg::Buffer(BufferId::AccumBuffer)];
        assert!(check_args(KernelId::Draw, &short).is_err());
    }

    #[test]
    fn test_pack_params() {
        let args = [
            Arg::Buffer(BufferId::ColorBuffer),
            Arg::Buffer(BufferId::AccumBuffer),
            Arg::Image,
            Arg::Float(0.25),
        ];
        let p = pack_params(WorkRange::Grid(800, 600), &args);
        assert_eq!(p.range, [800, 600]);
        assert_eq!(p.args[0], 0.25f32.to_bits());
        assert_eq!(&p.args[1..], &[0, 0, 0]);

        let p = pack_params(WorkRange::Linear(10), &[Arg::Int(-1), Arg::Int(7)]);
        assert_eq!(p.range, [10, 1]);
        assert_eq!(p.args[..2], [u32::MAX, 7]);
        assert_eq!(std::mem::size_of::<LaunchParams>(), 32);
    }

    #[test]
    fn test_workgroups() {
        assert_eq!(WorkRange::Linear(1).workgroups(65535), [1, 1]);
        assert_eq!(WorkRange::Linear(64).workgroups(65535), [1, 1]);
        assert_eq!(WorkRange::Linear(65).workgroups(65535), [2, 1]);
        assert_eq!(WorkRange::Grid(800, 600).workgroups(65535), [100, 75]);
        // 1-D overflow folds into y and still covers every item
        let [x, y] = WorkRange::Linear(10_000_000).workgroups(65535);
        assert!(x <= 65535);
        assert!(x * y * LINEAR_WORKGROUP >= 10_000_000);
        assert!(WorkRange::Grid(0, 5).is_empty());
    }

    #[test]
    fn test_program_source_order() {
        let opts = ProgramOptions::default();
        let src = opts.source(KernelId::Draw);
        let defines = src.find("const COLOR_SCALE: f32 = 1024.0;").unwrap();
        let prelude = src.find("struct LaunchParams").unwrap();
        let body = src.find("fn main").unwrap();
        assert!(defines < prelude && prelude < body);
    }
}
