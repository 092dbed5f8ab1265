//! # raystream
//!
//! Progressive GPU path tracer built around a stream-compaction scheduler.
//!
//! Every sample is traced as a sequence of compute kernels on one ordered
//! device queue. Between bounces the active rays are compacted with a
//! two-channel prefix scan and diffuse bounces are expanded into as many new
//! rays as the fixed ray capacity allows. Samples are blended into a running
//! per-pixel estimate and written to a presentation image.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math helpers
//! - [`record`] - Fixed-layout binary records shared with the kernels
//! - [`device`] - Session, buffer registry, kernel set, presentation image
//! - [`pipeline`] - Sample orchestration, stream compaction, accumulation
//! - [`scene`] - Shapes, bounding-sphere index, camera rig, demo scene
//! - [`settings`] - Persistent render settings
//!
//! ## Example
//!
//! ```ignore
//! use raystream::device::{ProgramOptions, Session, SessionOptions};
//! use raystream::pipeline::RenderContext;
//! use raystream::scene::DemoScene;
//!
//! let session = Session::new(&SessionOptions::default())?;
//! let mut ctx = RenderContext::new(session, 800, 600, ProgramOptions::default())?;
//! let scene = DemoScene::new();
//! ctx.load_geometry(&scene.shapes()?)?;
//! ctx.load_emitters(&scene.emitters()?)?;
//! for _ in 0..16 {
//!     let stats = ctx.render_sample()?;
//!     println!("sample {}: {} rays", stats.sample, stats.rays_traced());
//! }
//! ```

pub mod util;
pub mod record;
pub mod device;
pub mod pipeline;
pub mod scene;
pub mod settings;

// Re-export commonly used types
pub use device::{Session, SessionOptions};
pub use pipeline::{FrameStats, RenderContext};
pub use settings::RenderSettings;
pub use util::{Error, Result};

/// Build date, set by build.rs
pub const BUILD_DATE: &str = env!("RAYSTREAM_BUILD_DATE");
/// Build time (UTC), set by build.rs
pub const BUILD_TIME: &str = env!("RAYSTREAM_BUILD_TIME");
