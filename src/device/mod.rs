//! Compute device layer: session, buffer registry, kernel set, presentation image.

mod buffers;
pub(crate) mod image;
mod kernels;
mod runtime;
mod session;

pub use buffers::{check_transfer, BufferId, BufferRegistry, BufferSizes, TRANSFER_ALIGN};
pub use image::{PresentationImage, IMAGE_FORMAT};
pub use kernels::{
    check_args, pack_params, Arg, Dimension, KernelId, KernelSet, LaunchParams, Param, ProgramOptions,
    WorkRange, GRID_WORKGROUP, LINEAR_WORKGROUP, MAX_SCALARS, PARAMS_BINDING,
};
pub use runtime::Runtime;
pub use session::{Session, SessionOptions};
