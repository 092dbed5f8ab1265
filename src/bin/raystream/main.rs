//! raystream CLI - headless progressive rendering of the demo scene.

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use raystream::device::{ProgramOptions, Session};
use raystream::pipeline::{FrameStats, RenderContext, MAX_DEPTH};
use raystream::scene::DemoScene;
use raystream::util::Vec3;
use raystream::RenderSettings;

const REPORT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct Cli {
    width: Option<u32>,
    height: Option<u32>,
    samples: Option<u32>,
    config: Option<PathBuf>,
    animate: bool,
    low_power: bool,
    save_config: bool,
    verbosity: u8,
    quiet: bool,
}

fn print_help() {
    println!(
        "raystream {} (built {} {} UTC)",
        env!("CARGO_PKG_VERSION"),
        raystream::BUILD_DATE,
        raystream::BUILD_TIME
    );
    println!("Progressive GPU path tracer, renders the demo scene headless.");
    println!();
    println!("USAGE: raystream [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  --width <N>        Image width in pixels");
    println!("  --height <N>       Image height in pixels");
    println!("  --samples <N>      Samples to accumulate");
    println!("  --config <PATH>    Settings file (default: config dir)");
    println!("  --animate          Ripple the front star every sample");
    println!("  --low-power        Prefer an integrated adapter");
    println!("  --save-config      Write the effective settings back");
    println!("  -v, -vv            Debug / trace output");
    println!("  -q                 Errors only");
    println!();
    println!("ENVIRONMENT:");
    println!("  RUST_LOG           Log filter, overrides -v/-q");
    println!("  RAYSTREAM_TRACE=1  Write trace.json (trace feature)");
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> anyhow::Result<T> {
    let Some(value) = value else {
        bail!("{flag} needs a value");
    };
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid value for {flag}: {value}"))
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Cli>> {
    let mut cli = Cli::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-v" | "--verbose" => cli.verbosity = 1,
            "-vv" | "--trace" => cli.verbosity = 2,
            "-q" | "--quiet" => cli.quiet = true,
            "--animate" => cli.animate = true,
            "--low-power" => cli.low_power = true,
            "--save-config" => cli.save_config = true,
            "--width" => cli.width = Some(parse_value(arg, iter.next())?),
            "--height" => cli.height = Some(parse_value(arg, iter.next())?),
            "--samples" => cli.samples = Some(parse_value(arg, iter.next())?),
            "--config" => cli.config = Some(parse_value(arg, iter.next())?),
            other => bail!("unknown argument: {other} (see --help)"),
        }
    }
    Ok(Some(cli))
}

fn env_filter(cli: &Cli) -> EnvFilter {
    let level = match (cli.quiet, cli.verbosity) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("raystream={level},wgpu_core=warn,wgpu_hal=warn,naga=warn"))
    })
}

/// Install the fmt subscriber, plus Chrome tracing when RAYSTREAM_TRACE=1.
#[cfg(feature = "trace")]
fn init_tracing(cli: &Cli) -> Option<tracing_chrome::FlushGuard> {
    let registry = tracing_subscriber::registry()
        .with(env_filter(cli))
        .with(tracing_subscriber::fmt::layer().with_target(false));

    if env::var("RAYSTREAM_TRACE").ok().as_deref() == Some("1") {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        registry.with(chrome_layer).init();
        return Some(guard);
    }
    registry.init();
    None
}

#[cfg(not(feature = "trace"))]
fn init_tracing(cli: &Cli) {
    tracing_subscriber::registry()
        .with(env_filter(cli))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Mean absolute per-channel difference between two estimates.
fn mean_change(a: &[Vec3], b: &[Vec3]) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (*x - *y).abs().element_sum()).sum();
    sum / (a.len() * 3) as f32
}

fn report(window: &[FrameStats], elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(1e-9);
    let rays: u64 = window.iter().map(FrameStats::rays_traced).sum();
    let mut per_depth = [0u64; MAX_DEPTH as usize];
    for stats in window {
        for bounce in &stats.bounces {
            per_depth[bounce.depth as usize] += u64::from(bounce.active);
        }
    }
    let n = window.len().max(1) as u64;
    let bounces: Vec<String> = per_depth.iter().map(|c| (c / n).to_string()).collect();
    tracing::info!(
        "samples/s: {:.1}, Mrays/s: {:.2}, active per bounce: [{}]",
        window.len() as f64 / secs,
        rays as f64 / secs / 1e6,
        bounces.join(", ")
    );
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(cli) = parse_args(&args)? else {
        print_help();
        return Ok(());
    };
    let _guard = init_tracing(&cli);

    let mut settings = match &cli.config {
        Some(path) => RenderSettings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => RenderSettings::load(),
    };
    if let Some(w) = cli.width {
        settings.width = w;
    }
    if let Some(h) = cli.height {
        settings.height = h;
    }
    if let Some(s) = cli.samples {
        settings.samples = s;
    }
    settings.animate |= cli.animate;
    settings.high_performance &= !cli.low_power;
    settings.sanitize();
    tracing::debug!("Settings: {:?}", settings);

    if cli.save_config {
        match &cli.config {
            Some(path) => settings.save_to(path)?,
            None => settings.save()?,
        }
    }

    let session = Session::new(&settings.session_options()).context("acquiring GPU device")?;
    let mut ctx = RenderContext::new(session, settings.width, settings.height, ProgramOptions::default())
        .context("creating render context")?;

    let mut scene = DemoScene::new();
    ctx.load_geometry(&scene.shapes()?)?;
    ctx.load_emitters(&scene.emitters()?)?;
    settings.apply_camera(ctx.camera_mut());
    ctx.update_motion();

    let started = Instant::now();
    let mut window = Vec::new();
    let mut window_start = Instant::now();
    let mut previous: Option<Vec<Vec3>> = None;
    let mut checkpoint = 1u32;

    for _ in 0..settings.samples {
        if settings.animate {
            scene.advance();
            ctx.load_geometry(&scene.shapes()?)?;
            ctx.update_motion();
        }

        let stats = ctx.render_sample().context("rendering sample")?;
        tracing::trace!("{:?}", stats);

        // Convergence check at power-of-two sample counts
        if !settings.animate && stats.sample == checkpoint {
            let estimate = ctx.read_accumulation()?;
            if let Some(prev) = &previous {
                tracing::debug!(
                    "sample {}: mean change {:.6}",
                    stats.sample,
                    mean_change(&estimate, prev)
                );
            }
            previous = Some(estimate);
            checkpoint = checkpoint.saturating_mul(2);
        }

        window.push(stats);
        if window_start.elapsed() >= REPORT_PERIOD {
            report(&window, window_start.elapsed());
            window.clear();
            window_start = Instant::now();
        }
    }
    if !window.is_empty() {
        report(&window, window_start.elapsed());
    }

    tracing::info!(
        "Rendered {} samples at {}x{} in {:.2?}",
        settings.samples,
        settings.width,
        settings.height,
        started.elapsed()
    );
    ctx.dispose()?;
    Ok(())
}
