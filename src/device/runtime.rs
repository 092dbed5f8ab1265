//! Owned bundle of everything a launch needs.

use crate::device::{
    Arg, BufferId, BufferRegistry, BufferSizes, KernelId, KernelSet, PresentationImage, ProgramOptions,
    Session, WorkRange,
};
use crate::util::Result;

/// Session, buffers, kernels and presentation image of one render context.
#[derive(Debug)]
pub struct Runtime {
    pub session: Session,
    pub buffers: BufferRegistry,
    pub kernels: KernelSet,
    pub image: PresentationImage,
}

impl Runtime {
    /// Allocate buffers and the image, then compile the kernels.
    ///
    /// Device errors raised while allocating come back as [`crate::Error::Device`].
    pub fn new(
        mut session: Session,
        sizes: BufferSizes,
        options: ProgramOptions,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let (buffers, image) = session.scoped(|session| {
            let buffers = BufferRegistry::allocate(session, sizes)?;
            let image = PresentationImage::new(session, width, height);
            Ok((buffers, image))
        })?;
        let kernels = KernelSet::load(&mut session, options)?;
        Ok(Self {
            session,
            buffers,
            kernels,
            image,
        })
    }

    pub fn launch(&mut self, kernel: KernelId, range: WorkRange, args: &[Arg]) -> Result<()> {
        self.kernels
            .launch(&mut self.session, &self.buffers, &self.image, kernel, range, args)
    }

    pub fn store(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        self.buffers.store(&mut self.session, id, offset, data)
    }

    pub fn load(&mut self, id: BufferId, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.buffers.load(&mut self.session, id, offset, len)
    }

    pub fn clear(&mut self, id: BufferId) -> Result<()> {
        self.buffers.clear_all(&mut self.session, id)
    }

    pub fn flush(&mut self) {
        self.session.flush();
    }

    pub fn wait(&mut self) -> Result<()> {
        self.session.wait()
    }
}
