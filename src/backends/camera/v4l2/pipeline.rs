// SPDX-License-Identifier: MPL-2.0

//! V4L2 MJPEG GStreamer pipeline for camera capture
//!
//! Equivalent launch line:
//!
//! ```text
//! v4l2src device=/dev/video34 ! image/jpeg,width=1920,height=1080,framerate=30/1 !
//!     jpegdec ! videoconvert ! video/x-raw,format=RGBA ! appsink
//! ```

use super::bus;
use crate::backends::camera::types::{FrameData, FrameSnapshot, TargetState};
use crate::backends::camera::{EventBridge, GraphFactory, MediaGraph};
use crate::config::CameraConfig;
use crate::constants::{controls, elements, timing};
use crate::errors::{CameraError, CameraResult};
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Builds [`V4l2Graph`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2GraphFactory;

impl GraphFactory for V4l2GraphFactory {
    fn build(
        &self,
        config: &CameraConfig,
        bridge: Arc<EventBridge>,
    ) -> CameraResult<Box<dyn MediaGraph>> {
        Ok(Box::new(V4l2Graph::new(config, bridge)?))
    }
}

/// Five-node capture graph: source, decoder, converter, sink and bus
pub struct V4l2Graph {
    pipeline: gstreamer::Pipeline,
    source: gstreamer::Element,
    appsink: AppSink,
    bus: Mutex<Option<gstreamer::Bus>>,
    shut_down: AtomicBool,
}

impl V4l2Graph {
    /// Create and link the pipeline, then hook both callbacks to `bridge`
    pub fn new(config: &CameraConfig, bridge: Arc<EventBridge>) -> CameraResult<Self> {
        info!(
            device = %config.device_path,
            width = config.width,
            height = config.height,
            framerate = config.framerate,
            "Creating V4L2 pipeline"
        );

        crate::init()?;

        let pipeline = gstreamer::Pipeline::with_name(elements::PIPELINE_NAME);

        let source = make_element(elements::SOURCE_FACTORY, elements::SOURCE_NAME)?;
        source.set_property("device", config.device_path.as_str());

        let decoder = make_element(elements::DECODER_FACTORY, elements::DECODER_NAME)?;
        let convert = make_element(elements::CONVERT_FACTORY, elements::CONVERT_NAME)?;

        let appsink = AppSink::builder().name(elements::SINK_NAME).build();
        // Present frames at their timestamps and don't drop late ones for QoS
        appsink.set_property("sync", true);
        appsink.set_property("qos", false);
        appsink.set_property("max-buffers", 1u32);
        appsink.set_property("drop", true);

        let bus = pipeline.bus().ok_or_else(|| {
            CameraError::ElementCreation {
                factory: "bus".to_string(),
                reason: "pipeline has no bus".to_string(),
            }
        })?;

        let graph = Self {
            pipeline,
            source,
            appsink,
            bus: Mutex::new(Some(bus)),
            shut_down: AtomicBool::new(false),
        };

        // Dropping `graph` on any error below runs shutdown(), so nothing
        // half-linked stays alive.
        graph.link(&decoder, &convert, config)?;
        graph.connect(bridge);

        info!("V4L2 pipeline created");
        Ok(graph)
    }

    fn link(
        &self,
        decoder: &gstreamer::Element,
        convert: &gstreamer::Element,
        config: &CameraConfig,
    ) -> CameraResult<()> {
        self.pipeline
            .add_many([
                &self.source,
                decoder,
                convert,
                self.appsink.upcast_ref::<gstreamer::Element>(),
            ])
            .map_err(|e| CameraError::ElementCreation {
                factory: elements::PIPELINE_NAME.to_string(),
                reason: format!("failed to add elements: {}", e),
            })?;

        let mjpeg_caps = gstreamer::Caps::builder(elements::MJPEG_MEDIA_TYPE)
            .field("width", config.width as i32)
            .field("height", config.height as i32)
            .field(
                "framerate",
                gstreamer::Fraction::new(config.framerate as i32, 1),
            )
            .build();
        debug!(caps = %mjpeg_caps, "Source caps");
        self.source
            .link_filtered(decoder, &mjpeg_caps)
            .map_err(|e| link_error(&self.source, decoder, e))?;

        decoder
            .link(convert)
            .map_err(|e| link_error(decoder, convert, e))?;

        let raw_caps = gstreamer::Caps::builder(elements::RAW_VIDEO_MEDIA_TYPE)
            .field("format", config.output_format.as_str())
            .build();
        debug!(caps = %raw_caps, "Sink caps");
        convert
            .link_filtered(&self.appsink, &raw_caps)
            .map_err(|e| link_error(convert, self.appsink.upcast_ref(), e))?;

        Ok(())
    }

    fn connect(&self, bridge: Arc<EventBridge>) {
        if let Some(pipeline_bus) = self.lock_bus().as_ref() {
            let bus_bridge = Arc::clone(&bridge);
            pipeline_bus.set_sync_handler(move |_bus, message| {
                bus_bridge.on_bus_event(bus::classify(message));
                gstreamer::BusSyncReply::Drop
            });
        }

        self.appsink.set_callbacks(
            AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame = pull_frame(appsink)?;
                    bridge.on_frame(frame);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );
    }

    fn lock_bus(&self) -> std::sync::MutexGuard<'_, Option<gstreamer::Bus>> {
        self.bus
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MediaGraph for V4l2Graph {
    fn set_state(&self, target: TargetState, timeout: Option<Duration>) -> CameraResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(CameraError::StateChange {
                target,
                reason: "pipeline released".to_string(),
            });
        }
        change_state(&self.pipeline, target, timeout)
    }

    fn apply_zoom(&self, step: i32) -> CameraResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(CameraError::ZoomControl("source released".to_string()));
        }

        let extra_controls = gstreamer::Structure::builder(controls::CONTROLS_STRUCTURE)
            .field(controls::ZOOM_ABSOLUTE, step)
            .build();

        if self
            .source
            .find_property(controls::EXTRA_CONTROLS_PROPERTY)
            .is_none()
        {
            return Err(CameraError::ZoomControl(format!(
                "{} has no {} property",
                elements::SOURCE_FACTORY,
                controls::EXTRA_CONTROLS_PROPERTY
            )));
        }
        // v4l2src reports a rejected control on the bus, not here
        self.source
            .set_property(controls::EXTRA_CONTROLS_PROPERTY, extra_controls);

        debug!(step, "Applied zoom control");
        Ok(())
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("Clearing appsink callbacks");
        self.appsink
            .set_callbacks(AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to set pipeline to NULL");
        }
        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::TEARDOWN_TIMEOUT_SECS,
        ));
        debug!(?result, ?state, "Pipeline stopped");

        if let Some(pipeline_bus) = self.lock_bus().take() {
            pipeline_bus.unset_sync_handler();
        }
        info!("V4L2 pipeline released");
    }
}

impl Drop for V4l2Graph {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Request `target` on `pipeline` and wait up to `timeout` for it to settle
fn change_state(
    pipeline: &gstreamer::Pipeline,
    target: TargetState,
    timeout: Option<Duration>,
) -> CameraResult<()> {
    let state = match target {
        TargetState::Ready => gstreamer::State::Ready,
        TargetState::Paused => gstreamer::State::Paused,
        TargetState::Playing => gstreamer::State::Playing,
    };

    let result = pipeline.set_state(state).map_err(|e| {
        error!(?state, error = %e, "State change refused");
        CameraError::StateChange {
            target,
            reason: e.to_string(),
        }
    })?;

    if result != gstreamer::StateChangeSuccess::Async {
        debug!(?state, ?result, "State change completed");
        return Ok(());
    }

    // Block until the engine confirms or the deadline passes
    let wait = timeout.map(clock_time);
    let (result, current, pending) = pipeline.state(wait);
    match result {
        Ok(gstreamer::StateChangeSuccess::Async) => {
            warn!(?current, ?pending, "State change still pending at deadline");
            Err(CameraError::StateChangeTimeout {
                target,
                waited: timeout.unwrap_or_default(),
            })
        }
        Ok(_) => {
            debug!(?current, "Asynchronous state change completed");
            Ok(())
        }
        Err(e) => {
            error!(?current, ?pending, error = %e, "Failed to get the current state");
            Err(CameraError::StateChange {
                target,
                reason: e.to_string(),
            })
        }
    }
}

/// Saturating conversion; `u64::MAX` nanoseconds is reserved for "none"
fn clock_time(duration: Duration) -> gstreamer::ClockTime {
    let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX - 1);
    gstreamer::ClockTime::from_nseconds(nanos.min(u64::MAX - 1))
}

fn make_element(factory: &str, name: &str) -> CameraResult<gstreamer::Element> {
    gstreamer::ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|e| {
            error!(factory, error = %e, "Failed to create element");
            CameraError::ElementCreation {
                factory: factory.to_string(),
                reason: e.to_string(),
            }
        })
}

fn link_error(
    from: &gstreamer::Element,
    to: &gstreamer::Element,
    err: impl std::fmt::Display,
) -> CameraError {
    error!(from = %from.name(), to = %to.name(), error = %err, "Failed to link elements");
    CameraError::Link {
        from: from.name().to_string(),
        to: to.name().to_string(),
        reason: err.to_string(),
    }
}

/// Pull the pending sample and wrap it as a snapshot without copying pixels
fn pull_frame(appsink: &AppSink) -> Result<FrameSnapshot, gstreamer::FlowError> {
    let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;

    let caps = sample.caps().ok_or_else(|| {
        error!("No caps in sample");
        gstreamer::FlowError::Error
    })?;
    let video_info = VideoInfo::from_caps(caps).map_err(|e| {
        error!(error = ?e, "Failed to get video info");
        gstreamer::FlowError::Error
    })?;

    let buffer = sample.buffer_owned().ok_or_else(|| {
        error!("No buffer in sample");
        gstreamer::FlowError::Error
    })?;
    let mapped = buffer.into_mapped_buffer_readable().map_err(|_| {
        error!("Failed to map buffer");
        gstreamer::FlowError::Error
    })?;

    Ok(FrameSnapshot::new(
        video_info.width(),
        video_info.height(),
        FrameData::from_mapped_buffer(mapped),
    ))
}
