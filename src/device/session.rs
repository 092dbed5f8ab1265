//! Device session: adapter, device and the single ordered execution queue.
//!
//! Kernel launches and buffer copies are recorded into command buffers that
//! stay pending until [`Session::flush`]. Submission order is execution order,
//! so a flush is the ordering barrier between dependent launches, and
//! [`Session::wait`] is the point where the host observes the results.

use crate::util::{Error, Result};

/// Options for acquiring a device.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub power_preference: wgpu::PowerPreference,
    pub backends: wgpu::Backends,
    /// Accept a software adapter if no hardware one is present.
    pub allow_fallback: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            backends: wgpu::Backends::PRIMARY,
            allow_fallback: false,
        }
    }
}

/// Owned device context with its execution queue.
pub struct Session {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
    pending: Vec<wgpu::CommandBuffer>,
}

impl Session {
    /// Acquire an adapter and device, blocking until both are ready.
    ///
    /// Limits are raised to what the adapter supports so that the ray
    /// buffers of large resolutions fit in one storage binding.
    #[tracing::instrument(skip_all, fields(backends = ?options.backends))]
    pub fn new(options: &SessionOptions) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .map_err(|e| Error::NoAdapter(e.to_string()))?;

        let info = adapter.get_info();
        if info.device_type == wgpu::DeviceType::Cpu && !options.allow_fallback {
            return Err(Error::NoAdapter(format!(
                "only software adapter available ({})",
                info.name
            )));
        }
        tracing::info!("Using adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("raystream device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .map_err(|e| Error::DeviceRequest(e.to_string()))?;

        Ok(Self {
            device,
            queue,
            info,
            pending: Vec::new(),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Create an encoder for one unit of queued work.
    pub fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Queue recorded work; it runs after everything queued before it.
    pub fn enqueue(&mut self, commands: wgpu::CommandBuffer) {
        self.pending.push(commands);
    }

    /// Number of command buffers recorded but not yet submitted.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Submit all pending work, including staged buffer writes.
    pub fn flush(&mut self) {
        self.queue.submit(self.pending.drain(..));
    }

    /// Flush and block until the device has drained the queue.
    pub fn wait(&mut self) -> Result<()> {
        self.flush();
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::Poll(e.to_string()))?;
        Ok(())
    }

    /// Start capturing device errors raised by subsequent calls.
    pub fn push_error_scope(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    /// Stop capturing; returns the first captured error.
    ///
    /// Must pair with [`Session::push_error_scope`].
    pub fn pop_error_scope(&self) -> Result<()> {
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(err) => Err(Error::device(err)),
            None => Ok(()),
        }
    }

    /// Run `f` with device errors captured and turned into [`Error::Device`].
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.push_error_scope();
        let result = f(self);
        let scope = self.pop_error_scope();
        let value = result?;
        scope?;
        Ok(value)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("adapter", &self.info.name)
            .field("backend", &self.info.backend)
            .field("pending", &self.pending.len())
            .finish()
    }
}
