// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline lifecycle controller
//!
//! Owns the built graph and drives it through
//! `Unbuilt -> Ready -> Paused -> Playing`, with `stop` returning to `Ready`
//! and `teardown` reaching the terminal `Destroyed` state from anywhere.
//! Host calls may come from any thread while the bridge is being fed by the
//! streaming thread.
//!
//! Two locks are involved. `transitions` serializes build, state changes
//! and teardown, and is held while the engine works. `inner` only guards
//! the bookkeeping and is never held across a call into the graph, so the
//! frame-ready handler can query the controller while a host thread waits
//! for the engine to leave the streaming callback.

use super::bridge::{CaptureCallback, EventBridge};
use super::types::{FrameSnapshot, PipelineState, TargetState, ZoomRange};
use super::v4l2::V4l2GraphFactory;
use super::{GraphFactory, MediaGraph, StreamHandler};
use crate::config::CameraConfig;
use crate::errors::{CameraError, CameraResult};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

struct Inner {
    graph: Option<Arc<dyn MediaGraph>>,
    state: PipelineState,
    zoom_step: Option<i32>,
}

pub struct CameraController {
    config: CameraConfig,
    factory: Box<dyn GraphFactory>,
    bridge: Arc<EventBridge>,
    transitions: Mutex<()>,
    inner: Mutex<Inner>,
}

impl CameraController {
    /// Create an unbuilt controller using the given graph factory
    pub fn new(
        config: CameraConfig,
        factory: impl GraphFactory + 'static,
        handler: impl StreamHandler + 'static,
    ) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            bridge: EventBridge::new(handler).into_shared(),
            transitions: Mutex::new(()),
            inner: Mutex::new(Inner {
                graph: None,
                state: PipelineState::Unbuilt,
                zoom_step: None,
            }),
        }
    }

    /// Create an unbuilt controller for the V4L2 MJPEG pipeline
    pub fn v4l2(config: CameraConfig, handler: impl StreamHandler + 'static) -> Self {
        Self::new(config, V4l2GraphFactory, handler)
    }

    /// Construct and link the graph
    ///
    /// On failure the controller stays `Unbuilt`. With `preroll` enabled a
    /// successful build continues to `Paused`; a preroll failure is logged
    /// and leaves the graph `Ready`.
    pub fn build(&self) -> CameraResult<()> {
        let _serial = self.serialize();

        let state = self.lock().state;
        if state != PipelineState::Unbuilt {
            return Err(CameraError::InvalidState {
                operation: "build",
                state,
            });
        }

        self.config.validate()?;
        info!(device = %self.config.device_path, "Building camera pipeline");

        let graph: Arc<dyn MediaGraph> =
            Arc::from(self.factory.build(&self.config, Arc::clone(&self.bridge))?);
        {
            let mut inner = self.lock();
            inner.graph = Some(graph);
            inner.state = PipelineState::Ready;
        }
        info!("Camera pipeline built");

        if self.config.preroll {
            debug!("Prerolling pipeline");
            if let Err(e) = self.transition_serialized(TargetState::Paused) {
                warn!(error = %e, "Preroll failed");
            }
        }

        Ok(())
    }

    pub fn play(&self) -> CameraResult<()> {
        self.transition(TargetState::Playing)
    }

    pub fn pause(&self) -> CameraResult<()> {
        self.transition(TargetState::Paused)
    }

    pub fn stop(&self) -> CameraResult<()> {
        self.transition(TargetState::Ready)
    }

    /// Release the graph, the held frame and any pending capture request
    ///
    /// Idempotent; later calls are no-ops.
    pub fn teardown(&self) {
        let _serial = self.serialize();

        let graph = {
            let mut inner = self.lock();
            if inner.state == PipelineState::Destroyed {
                return;
            }
            info!(state = %inner.state, "Tearing down camera pipeline");
            inner.state = PipelineState::Destroyed;
            inner.zoom_step = None;
            inner.graph.take()
        };

        if let Some(graph) = graph {
            graph.shutdown();
        }
        self.bridge.slot().clear();
    }

    /// Apply a zoom level within [`Self::zoom_range`]
    ///
    /// Out-of-range levels are rejected before touching the device. Accepted
    /// levels are truncated to the device's integer steps.
    pub fn set_zoom(&self, level: f32) -> CameraResult<()> {
        let range = self.zoom_range();
        if !range.contains(level) {
            return Err(CameraError::ZoomOutOfRange { level, range });
        }

        let graph = self.live_graph("set zoom")?;
        let step = ZoomRange::to_step(level);
        graph.apply_zoom(step)?;

        let mut inner = self.lock();
        if inner.state.is_live() {
            inner.zoom_step = Some(step);
        }
        info!(level, step, "Set zoom level");
        Ok(())
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.config.zoom_range()
    }

    /// Last zoom step accepted by the device
    pub fn zoom_step(&self) -> Option<i32> {
        self.lock().zoom_step
    }

    /// Register a callback for the next completed still capture
    ///
    /// This profile streams from `v4l2src`, which never posts capture
    /// completions, so the callback is stored but not expected to fire.
    pub fn capture_still(&self, callback: CaptureCallback) {
        warn!(
            error = %CameraError::Unsupported("Still capture with v4l2src"),
            "Capture request stored"
        );
        self.bridge.set_capture_request(callback);
    }

    /// Latest frame snapshot, shared without copying
    pub fn frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.bridge.slot().load()
    }

    /// Packed RGBA copy of the latest frame
    pub fn get_frame(&self) -> Option<Vec<u8>> {
        self.bridge.slot().read_packed()
    }

    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.bridge.slot().dimensions()
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Bridge fed by the streaming thread
    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }

    fn transition(&self, target: TargetState) -> CameraResult<()> {
        let _serial = self.serialize();
        self.transition_serialized(target)
    }

    // Callers hold `transitions`, so the state read here cannot change
    // under us until the commit below.
    fn transition_serialized(&self, target: TargetState) -> CameraResult<()> {
        let operation = match target {
            TargetState::Playing => "play",
            TargetState::Paused => "pause",
            TargetState::Ready => "stop",
        };
        let state = self.state();
        let graph = self.live_graph(operation)?;
        let timeout = self.config.state_change_timeout();

        match graph.set_state(target, timeout) {
            Ok(()) => {}
            Err(e @ CameraError::StateChangeTimeout { .. }) => {
                // The engine keeps moving toward `target`; pull it back so the
                // reported state stays true.
                if let Some(previous) = state.as_target() {
                    warn!(from = %state, to = %target, "State change timed out, reverting");
                    if let Err(revert) = graph.set_state(previous, timeout) {
                        warn!(error = %revert, "Failed to revert to the previous state");
                    }
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        self.lock().state = target.into();
        debug!(from = %state, to = %target, "Pipeline state changed");
        Ok(())
    }

    fn live_graph(&self, operation: &'static str) -> CameraResult<Arc<dyn MediaGraph>> {
        let inner = self.lock();
        match (&inner.graph, inner.state.is_live()) {
            (Some(graph), true) => Ok(Arc::clone(graph)),
            _ => Err(CameraError::InvalidState {
                operation,
                state: inner.state,
            }),
        }
    }

    fn serialize(&self) -> MutexGuard<'_, ()> {
        self.transitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Host callbacks never run under this lock, so poisoning only follows a
    // panic inside the controller; the state it guards is still consistent.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for CameraController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraController")
            .field("device", &self.config.device_path)
            .field("state", &self.state())
            .field("bridge", &self.bridge)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{OnceLock, Weak, mpsc};
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Calls {
        states: Vec<TargetState>,
        zooms: Vec<i32>,
        shutdowns: usize,
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    enum PlayOutcome {
        #[default]
        Succeed,
        Refuse,
        TimeOut,
    }

    struct FakeGraph {
        calls: Arc<Mutex<Calls>>,
        play: PlayOutcome,
    }

    impl MediaGraph for FakeGraph {
        fn set_state(&self, target: TargetState, timeout: Option<Duration>) -> CameraResult<()> {
            if target == TargetState::Playing {
                match self.play {
                    PlayOutcome::Succeed => {}
                    PlayOutcome::Refuse => {
                        return Err(CameraError::StateChange {
                            target,
                            reason: "device busy".to_string(),
                        });
                    }
                    PlayOutcome::TimeOut => {
                        self.calls.lock().unwrap().states.push(target);
                        return Err(CameraError::StateChangeTimeout {
                            target,
                            waited: timeout.unwrap_or_default(),
                        });
                    }
                }
            }
            self.calls.lock().unwrap().states.push(target);
            Ok(())
        }

        fn apply_zoom(&self, step: i32) -> CameraResult<()> {
            self.calls.lock().unwrap().zooms.push(step);
            Ok(())
        }

        fn shutdown(&self) {
            self.calls.lock().unwrap().shutdowns += 1;
        }
    }

    #[derive(Clone, Default)]
    struct FakeFactory {
        calls: Arc<Mutex<Calls>>,
        fail_build: bool,
        play: PlayOutcome,
    }

    impl GraphFactory for FakeFactory {
        fn build(
            &self,
            _config: &CameraConfig,
            _bridge: Arc<EventBridge>,
        ) -> CameraResult<Box<dyn MediaGraph>> {
            if self.fail_build {
                return Err(CameraError::ElementCreation {
                    factory: "jpegdec".to_string(),
                    reason: "no such element".to_string(),
                });
            }
            Ok(Box::new(FakeGraph {
                calls: Arc::clone(&self.calls),
                play: self.play,
            }))
        }
    }

    /// Finishes every state change only after the streaming thread has
    /// delivered a frame and returned from the handler, like a sink that
    /// holds its stream lock inside the sample callback.
    struct StreamingGraph {
        bridge: Arc<EventBridge>,
    }

    impl MediaGraph for StreamingGraph {
        fn set_state(&self, target: TargetState, _timeout: Option<Duration>) -> CameraResult<()> {
            let bridge = Arc::clone(&self.bridge);
            let (done_tx, done_rx) = mpsc::channel();
            thread::spawn(move || {
                bridge.on_frame(FrameSnapshot::new(1, 1, vec![0; 4]));
                let _ = done_tx.send(());
            });

            let waited = Duration::from_secs(5);
            done_rx
                .recv_timeout(waited)
                .map_err(|_| CameraError::StateChangeTimeout { target, waited })
        }

        fn apply_zoom(&self, _step: i32) -> CameraResult<()> {
            Ok(())
        }

        fn shutdown(&self) {}
    }

    struct StreamingFactory;

    impl GraphFactory for StreamingFactory {
        fn build(
            &self,
            _config: &CameraConfig,
            bridge: Arc<EventBridge>,
        ) -> CameraResult<Box<dyn MediaGraph>> {
            Ok(Box::new(StreamingGraph { bridge }))
        }
    }

    fn built(factory: FakeFactory) -> CameraController {
        let controller = CameraController::new(CameraConfig::default(), factory, || {});
        controller.build().unwrap();
        controller
    }

    #[test]
    fn test_build_prerolls_to_paused() {
        let factory = FakeFactory::default();
        let controller = built(factory.clone());
        assert_eq!(controller.state(), PipelineState::Paused);
        assert_eq!(factory.calls.lock().unwrap().states, vec![TargetState::Paused]);
    }

    #[test]
    fn test_build_without_preroll_stays_ready() {
        let config = CameraConfig {
            preroll: false,
            ..CameraConfig::default()
        };
        let controller = CameraController::new(config, FakeFactory::default(), || {});
        controller.build().unwrap();
        assert_eq!(controller.state(), PipelineState::Ready);
    }

    #[test]
    fn test_failed_build_stays_unbuilt() {
        let factory = FakeFactory {
            fail_build: true,
            ..FakeFactory::default()
        };
        let controller = CameraController::new(CameraConfig::default(), factory, || {});
        assert!(matches!(
            controller.build(),
            Err(CameraError::ElementCreation { .. })
        ));
        assert_eq!(controller.state(), PipelineState::Unbuilt);
        assert!(matches!(
            controller.play(),
            Err(CameraError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_state_machine() {
        let controller = built(FakeFactory::default());
        controller.play().unwrap();
        assert_eq!(controller.state(), PipelineState::Playing);
        controller.pause().unwrap();
        assert_eq!(controller.state(), PipelineState::Paused);
        controller.stop().unwrap();
        assert_eq!(controller.state(), PipelineState::Ready);
        controller.play().unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.state(), PipelineState::Ready);
    }

    #[test]
    fn test_failed_transition_keeps_last_state() {
        let factory = FakeFactory {
            play: PlayOutcome::Refuse,
            ..FakeFactory::default()
        };
        let controller = built(factory);
        controller
            .bridge()
            .on_frame(FrameSnapshot::new(1, 1, vec![1, 2, 3, 4]));

        assert!(matches!(
            controller.play(),
            Err(CameraError::StateChange { .. })
        ));
        assert_eq!(controller.state(), PipelineState::Paused);
        assert_eq!(controller.get_frame(), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_zoom_out_of_range_issues_no_update() {
        let factory = FakeFactory::default();
        let controller = built(factory.clone());

        for level in [-0.5, -f32::EPSILON, 3.000_1, 10.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                controller.set_zoom(level),
                Err(CameraError::ZoomOutOfRange { .. })
            ));
        }
        assert!(factory.calls.lock().unwrap().zooms.is_empty());
        assert_eq!(controller.zoom_step(), None);
    }

    #[test]
    fn test_zoom_in_range_truncates() {
        let factory = FakeFactory::default();
        let controller = built(factory.clone());

        for level in [0.0, 1.0, 2.7, 3.0] {
            controller.set_zoom(level).unwrap();
        }
        assert_eq!(factory.calls.lock().unwrap().zooms, vec![0, 1, 2, 3]);
        assert_eq!(controller.zoom_step(), Some(3));
    }

    #[test]
    fn test_zoom_before_build_fails() {
        let controller =
            CameraController::new(CameraConfig::default(), FakeFactory::default(), || {});
        assert!(matches!(
            controller.set_zoom(1.0),
            Err(CameraError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_no_frame_before_delivery() {
        let controller = built(FakeFactory::default());
        assert!(controller.get_frame().is_none());
        assert!(controller.frame_size().is_none());
    }

    #[test]
    fn test_capture_request_not_fired_by_frames() {
        let controller = built(FakeFactory::default());
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        controller.capture_still(Box::new(move |_| flag.store(true, Ordering::SeqCst)));

        controller
            .bridge()
            .on_frame(FrameSnapshot::new(1, 1, vec![0; 4]));
        controller.bridge().on_bus_event(super::super::BusEvent::Ignored);

        assert!(!fired.load(Ordering::SeqCst));
        assert!(controller.bridge().has_pending_capture());
    }

    #[test]
    fn test_teardown_twice() {
        let factory = FakeFactory::default();
        let controller = built(factory.clone());
        controller
            .bridge()
            .on_frame(FrameSnapshot::new(1, 1, vec![0; 4]));

        controller.teardown();
        controller.teardown();

        assert_eq!(controller.state(), PipelineState::Destroyed);
        assert_eq!(factory.calls.lock().unwrap().shutdowns, 1);
        assert!(controller.get_frame().is_none());
        assert!(controller.play().is_err());
        assert!(controller.build().is_err());
    }

    #[test]
    fn test_drop_tears_down() {
        let factory = FakeFactory::default();
        drop(built(factory.clone()));
        assert_eq!(factory.calls.lock().unwrap().shutdowns, 1);
    }

    #[test]
    fn test_frame_survives_stop() {
        let controller = built(FakeFactory::default());
        controller.play().unwrap();
        controller
            .bridge()
            .on_frame(FrameSnapshot::new(1920, 1080, vec![0u8; 1920 * 1080 * 4]));

        let frame = controller.get_frame().unwrap();
        assert_eq!(frame.len(), 1920 * 1080 * 4);
        assert!(frame.iter().all(|&b| b == 0));

        controller.stop().unwrap();
        assert_eq!(controller.get_frame().unwrap(), frame);
    }

    #[test]
    fn test_timed_out_transition_reverts_engine() {
        let factory = FakeFactory {
            play: PlayOutcome::TimeOut,
            ..FakeFactory::default()
        };
        let controller = built(factory.clone());

        assert!(matches!(
            controller.play(),
            Err(CameraError::StateChangeTimeout { .. })
        ));
        assert_eq!(controller.state(), PipelineState::Paused);
        assert_eq!(
            factory.calls.lock().unwrap().states,
            vec![TargetState::Paused, TargetState::Playing, TargetState::Paused]
        );
    }

    #[test]
    fn test_handler_can_query_controller_during_transition() {
        let cell: Arc<OnceLock<Weak<CameraController>>> = Arc::default();
        let observed = Arc::new(Mutex::new(Vec::new()));

        let handler = {
            let cell = Arc::clone(&cell);
            let observed = Arc::clone(&observed);
            move || {
                if let Some(controller) = cell.get().and_then(Weak::upgrade) {
                    let state = controller.state();
                    let zoom = controller.zoom_step();
                    observed.lock().unwrap().push((state, zoom));
                }
            }
        };

        let controller = Arc::new(CameraController::new(
            CameraConfig::default(),
            StreamingFactory,
            handler,
        ));
        cell.set(Arc::downgrade(&controller)).unwrap();

        controller.build().unwrap();
        assert_eq!(controller.state(), PipelineState::Paused);
        controller.play().unwrap();
        controller.set_zoom(2.0).unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.state(), PipelineState::Ready);

        assert_eq!(
            *observed.lock().unwrap(),
            vec![
                (PipelineState::Ready, None),
                (PipelineState::Paused, None),
                (PipelineState::Playing, Some(2)),
            ]
        );
    }

    #[test]
    fn test_state_readable_while_engine_waits() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        struct GatedGraph {
            entered: Mutex<mpsc::Sender<()>>,
            release: Mutex<mpsc::Receiver<()>>,
        }

        impl MediaGraph for GatedGraph {
            fn set_state(&self, target: TargetState, _timeout: Option<Duration>) -> CameraResult<()> {
                if target == TargetState::Playing {
                    self.entered.lock().unwrap().send(()).unwrap();
                    self.release.lock().unwrap().recv().unwrap();
                }
                Ok(())
            }

            fn apply_zoom(&self, _step: i32) -> CameraResult<()> {
                Ok(())
            }

            fn shutdown(&self) {}
        }

        struct GatedFactory(Mutex<Option<GatedGraph>>);

        impl GraphFactory for GatedFactory {
            fn build(
                &self,
                _config: &CameraConfig,
                _bridge: Arc<EventBridge>,
            ) -> CameraResult<Box<dyn MediaGraph>> {
                let graph = self.0.lock().unwrap().take().unwrap();
                Ok(Box::new(graph))
            }
        }

        let factory = GatedFactory(Mutex::new(Some(GatedGraph {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        })));
        let controller = Arc::new(CameraController::new(CameraConfig::default(), factory, || {}));
        controller.build().unwrap();

        let player = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || controller.play())
        };
        entered_rx.recv().unwrap();

        // The engine is mid-transition; bookkeeping is still reachable
        assert_eq!(controller.state(), PipelineState::Paused);
        controller.set_zoom(1.0).unwrap();
        assert_eq!(controller.zoom_step(), Some(1));

        release_tx.send(()).unwrap();
        player.join().unwrap().unwrap();
        assert_eq!(controller.state(), PipelineState::Playing);
    }
}
