// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Streaming preview with frame statistics
//! - Saving the latest frame
//! - Applying zoom levels

use chrono::Local;
use gst_camera::constants::timing;
use gst_camera::{CameraConfig, CameraPlugin};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Load the config file and apply command-line overrides
pub fn load_config(
    path: Option<&Path>,
    device: Option<String>,
) -> Result<CameraConfig, Box<dyn std::error::Error>> {
    let mut config = CameraConfig::load(path)?;
    if let Some(device) = device {
        config.device_path = device;
        config.validate()?;
    }
    Ok(config)
}

/// Print the effective configuration as JSON
pub fn print_config(config: &CameraConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config.to_json()?);
    Ok(())
}

/// Stream for `seconds` and report frame statistics
pub fn preview(config: CameraConfig, seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    gst_camera::init()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let frames = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&frames);
    let camera = open_camera(config, move || {
        counter.fetch_add(1, Ordering::Relaxed);
    })?;

    println!("Streaming for {} seconds (Ctrl+C to stop)...", seconds);
    let start = Instant::now();
    let duration = Duration::from_secs(seconds);
    while running.load(Ordering::SeqCst) && start.elapsed() < duration {
        std::thread::sleep(Duration::from_millis(100));
    }

    if !camera.stop() {
        eprintln!("Failed to stop the pipeline");
    }

    let elapsed = start.elapsed().as_secs_f64();
    let count = frames.load(Ordering::Relaxed);
    println!("Frames: {}", count);
    if elapsed > 0.0 {
        println!("Average: {:.1} fps", count as f64 / elapsed);
    }
    match camera.frame() {
        Some(frame) => println!(
            "Last frame: {}x{} ({} ms old)",
            frame.width,
            frame.height,
            frame.captured_at.elapsed().as_millis()
        ),
        None => println!("No frame received"),
    }

    camera.teardown();
    Ok(())
}

/// Save the latest frame as PNG
pub fn snapshot(
    config: CameraConfig,
    output: Option<PathBuf>,
    zoom: Option<f32>,
) -> Result<(), Box<dyn std::error::Error>> {
    gst_camera::init()?;

    let camera = open_camera(config, || {})?;
    if let Some(level) = zoom
        && !camera.set_zoom(level)
    {
        camera.teardown();
        return Err(format!(
            "Zoom level {} rejected (range {})",
            level,
            camera.zoom_range()
        )
        .into());
    }

    println!("Capturing...");
    let frame = wait_for_frame(&camera);
    camera.stop();
    camera.teardown();
    let frame = frame.ok_or("Failed to capture frame from camera")?;

    let output_path = match output {
        Some(path) => path,
        None => {
            let dir = get_default_picture_dir();
            std::fs::create_dir_all(&dir)?;
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("frame_{}.png", timestamp))
        }
    };

    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_packed_rgba())
        .ok_or("Frame size does not match its dimensions")?;
    image.save_with_format(&output_path, image::ImageFormat::Png)?;

    println!(
        "Frame saved: {} ({}x{})",
        output_path.display(),
        frame.width,
        frame.height
    );
    Ok(())
}

/// Apply a zoom level and report the result
pub fn zoom(config: CameraConfig, level: f32) -> Result<(), Box<dyn std::error::Error>> {
    gst_camera::init()?;

    let camera = CameraPlugin::create(config, || {});
    if !camera.is_built() {
        return Err("Failed to create the camera pipeline".into());
    }

    let range = camera.zoom_range();
    let applied = camera.set_zoom(level);
    camera.teardown();

    if applied {
        println!("Zoom set to {} (range {})", level, range);
        Ok(())
    } else {
        Err(format!("Zoom level {} rejected (range {})", level, range).into())
    }
}

fn open_camera(
    config: CameraConfig,
    handler: impl Fn() + Send + Sync + 'static,
) -> Result<CameraPlugin, Box<dyn std::error::Error>> {
    let device = config.device_path.clone();
    let camera = CameraPlugin::create(config, handler);
    if !camera.is_built() {
        return Err(format!("Failed to create the camera pipeline for {}", device).into());
    }
    if !camera.play() {
        camera.teardown();
        return Err("Failed to start the camera pipeline".into());
    }
    println!("Using camera: {}", device);
    Ok(camera)
}

fn wait_for_frame(camera: &CameraPlugin) -> Option<Arc<gst_camera::FrameSnapshot>> {
    let start = Instant::now();
    let timeout = Duration::from_secs(timing::FIRST_FRAME_TIMEOUT_SECS);

    while start.elapsed() < timeout {
        if let Some(frame) = camera.frame() {
            return Some(frame);
        }
        std::thread::sleep(Duration::from_millis(timing::FRAME_POLL_INTERVAL_MS));
    }
    None
}

fn get_default_picture_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("gst-camera")
}
