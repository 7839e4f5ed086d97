//! AR Sandbox - headless runner
//!
//! Feeds a synthetic sand surface through the acquisition worker and logs
//! filter statistics. Usage: `ar-sandbox [seconds]` (default 10).

use std::time::{Duration, Instant};

use ar_sandbox::sensor::{RawFrame, SyntheticSensor};
use ar_sandbox::settings::SandboxConfig;
use ar_sandbox::telemetry::{init_logging, LogConfig};
use ar_sandbox::SandboxApp;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const TICK: Duration = Duration::from_millis(16);

/// Sand at `base` raw units with a mound in the middle and some per-frame noise.
fn sand_frame(base: u16, seed: u32) -> RawFrame {
    let (cx, cy) = (WIDTH as f32 / 2.0, HEIGHT as f32 / 2.0);
    let mut data = Vec::with_capacity((WIDTH * HEIGHT) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let r2 = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)) / 120.0f32.powi(2);
            let mound = 80.0 * (-r2).exp();
            let noise = ((x * 7 + y * 13 + seed * 31) % 5) as f32 - 2.0;
            data.push((base as f32 - mound + noise).max(0.0) as u16);
        }
    }
    RawFrame::new(WIDTH, HEIGHT, data).unwrap_or_else(|_| RawFrame::filled(WIDTH, HEIGHT, base))
}

fn main() {
    let _log_guard = match init_logging(&LogConfig::default()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("AR Sandbox v{}", env!("CARGO_PKG_VERSION"));

    let run_for = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(10));

    let config = SandboxConfig::load();
    if SandboxConfig::default_path().is_some_and(|p| !p.exists()) {
        match config.save() {
            Ok(()) => tracing::info!("Wrote default configuration"),
            Err(e) => tracing::warn!("Could not write default configuration: {}", e),
        }
    }
    let mut sensor = SyntheticSensor::new(WIDTH, HEIGHT)
        .with_intrinsics(config.intrinsics)
        .with_frame_interval(Duration::from_millis(33));
    for seed in 0..30 {
        sensor.push_frame(sand_frame(1000, seed));
    }

    let mut app = match SandboxApp::start(sensor, config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to start acquisition: {}", e);
            return;
        }
    };

    if let Some(dir) = SandboxConfig::default_path().as_deref().and_then(|p| p.parent()) {
        app.restore(dir);
    }

    let started = Instant::now();
    let mut last_report = Instant::now();
    while started.elapsed() < run_for && app.is_running() {
        app.tick();

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            let stats = app.stats();
            tracing::info!(
                fps = stats.fps,
                avg_ms = stats.processing.avg_ms,
                p95_ms = stats.processing.p95_ms,
                published = stats.frames_published,
                dropped = stats.dropped.total(),
                ready = stats.first_image_ready,
                mode = %stats.mode,
                "Acquisition"
            );
            if let Some(probe) = app.session().project_roi_center() {
                tracing::info!(
                    elevation = probe.elevation,
                    u = probe.projector.x,
                    v = probe.projector.y,
                    "ROI centre"
                );
            }
        }

        std::thread::sleep(TICK);
    }

    if let Some(e) = app.last_error() {
        tracing::warn!("Stopped after sensor error: {}", e);
    }
    tracing::info!("Handled {} filtered frames", app.frames_handled());
    app.shutdown();
}
