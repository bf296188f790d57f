// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Measuring with a V4L2 camera or a synthetic pulse
//! - Probing a still image for finger placement
//! - Listing cameras and showing the configuration

use chrono::{DateTime, Local};
use fingertip_pulse::backends::camera::v4l2::enumerate_devices;
use fingertip_pulse::backends::camera::{
    CameraFrame, CameraProvider, SyntheticPulseCamera, V4l2Camera,
};
use fingertip_pulse::pulse::{
    DetectionSnapshot, PulseDetector, RegionSampler, SampleOutcome, SessionEvent, SystemClock,
    TokioScheduler,
};
use fingertip_pulse::Config;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Result of a completed measurement, as printed with `--json`
#[derive(Debug, Serialize)]
pub struct MeasurementReport {
    pub bpm: u32,
    pub measured_at: DateTime<Local>,
    pub duration_seconds: u32,
    pub samples: usize,
}

/// Measure with the configured V4L2 camera
pub fn measure(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    if !json {
        println!("Using camera: {}", config.camera_device);
        println!("Cover the rear camera and torch with your fingertip and hold still.");
    }
    let camera = V4l2Camera::new(config.camera_device.clone());
    run_blocking(camera, config, json)
}

/// Measure the synthetic pulse camera
pub fn simulate(config: &Config, bpm: f64, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    if !json {
        println!("Simulating a {:.0} BPM pulse", bpm);
    }
    let camera = SyntheticPulseCamera::new(bpm, SystemClock::new());
    run_blocking(camera, config, json)
}

fn run_blocking<P: CameraProvider>(
    camera: P,
    config: &Config,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_session(camera, config, json))
}

async fn run_session<P: CameraProvider>(
    camera: P,
    config: &Config,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session_config = config.session_config();
    let (scheduler, mut events) = TokioScheduler::new(session_config.frame_interval);

    // Ctrl+C takes the manual stop path
    let stop = scheduler.sender();
    ctrlc::set_handler(move || {
        let _ = stop.unbounded_send(SessionEvent::Stop);
    })?;

    let mut detector = PulseDetector::new(camera, scheduler, SystemClock::new(), session_config);
    detector.start_detection().await?;

    if !json {
        println!();
        println!("Measuring... (press Ctrl+C to stop early)");
    }

    let mut shown: Option<(u32, u32)> = None;
    detector
        .run_until_stopped(&mut events, |snapshot| {
            if json {
                return;
            }
            let line = (snapshot.progress_percent as u32, snapshot.current_bpm);
            if shown != Some(line) {
                shown = Some(line);
                print_progress(snapshot);
            }
        })
        .await;

    if !json {
        println!();
    }

    let snapshot = detector.snapshot().clone();
    match (snapshot.final_bpm, snapshot.error) {
        (Some(bpm), _) => {
            let report = MeasurementReport {
                bpm,
                measured_at: Local::now(),
                duration_seconds: config.duration_seconds,
                samples: snapshot.samples,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Heart rate: {} BPM", report.bpm);
            }
            Ok(())
        }
        (None, Some(error)) => Err(error.into()),
        (None, None) => {
            if !json {
                println!("Measurement stopped.");
            }
            Ok(())
        }
    }
}

fn print_progress(snapshot: &DetectionSnapshot) {
    let bpm = if snapshot.current_bpm > 0 {
        snapshot.current_bpm.to_string()
    } else {
        "--".to_string()
    };
    print!(
        "\rMeasuring: {:>3.0}%  BPM: {:>3}  samples: {:>3}",
        snapshot.progress_percent, bpm, snapshot.samples
    );
    let _ = std::io::stdout().flush();
}

/// Print the region statistics of a still image
pub fn probe_image(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::open(path)?.to_rgba8();
    let (width, height) = image.dimensions();
    let frame = CameraFrame::from_rgba(width, height, image.into_raw());

    let sampler = RegionSampler::new();
    let Some(stats) = sampler.measure(&frame) else {
        return Err(format!("{} is too small to sample ({}x{})", path.display(), width, height).into());
    };

    println!("Image: {} ({}x{})", path.display(), width, height);
    println!("Region: {}x{} centred", stats.side, stats.side);
    println!(
        "Mean RGB: {:.1} / {:.1} / {:.1}",
        stats.mean_red, stats.mean_green, stats.mean_blue
    );
    println!("Brightness: {:.1}", stats.brightness);

    match sampler.sample(Some(&frame), 0) {
        SampleOutcome::Accepted(_) => println!("Result: accepted"),
        SampleOutcome::Rejected(reason) => println!("Result: rejected ({:?})", reason),
    }
    Ok(())
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_devices();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  [{}] {}", camera.index, camera.name);
        println!("      Path: {}", camera.path);
    }

    Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match Config::default_path() {
        Some(path) if path.exists() => println!("Config file: {}", path.display()),
        Some(path) => println!("Config file: {} (not created, using defaults)", path.display()),
        None => println!("Config file: unavailable (using defaults)"),
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
