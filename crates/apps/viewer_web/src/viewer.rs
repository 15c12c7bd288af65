//! The cooperative viewer tick.
//!
//! One `tick` does, in order: drain host events, maybe poll the scene
//! metadata, poll every in-flight session call once, decode and upload a
//! budgeted number of parts, maybe push the camera, draw. Nothing runs
//! between ticks; session futures are polled with a no-op waker.

use std::task::{Context, Poll};

use formats::{SceneDescriptor, decode_payload};
use foundation::Time;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::task::noop_waker_ref;
use futures::{FutureExt as _, StreamExt as _};
use gpu::{FrameStats, GpuBackend, GpuError, GpuPrimitive, Overlay2d, RenderPipeline};
use runtime::{EventBus, Frame, FrameBudget, Metrics, MetricsSnapshot};
use scene::{InteractionController, InteractionOutcome, MouseAction, MouseEvent, SceneGraph};
use serde::{Deserialize, Serialize};
use streaming::{
    DecodeJob, DecodeQueue, FetchOutcome, FetchRequest, Inserted, ObjectCache, PollDecision,
    PollGate, SessionChannel, TransportError,
};
use thiserror::Error;

use crate::config::ViewerConfig;

/// Shown by the host when no renderer could be created.
pub const UNSUPPORTED_MESSAGE: &str = "WebGL not supported";

pub mod metric {
    pub const POLLS: &str = "scene.polls";
    pub const POLL_FAILED: &str = "scene.poll_failed";
    pub const SCENE_INVALID: &str = "scene.invalid";
    pub const CAMERA_RESETS: &str = "scene.camera_resets";
    pub const FETCHES: &str = "fetch.issued";
    pub const FETCH_FAILED: &str = "fetch.failed";
    pub const STALE_DISCARDS: &str = "fetch.stale_discards";
    pub const DECODED: &str = "decode.completed";
    pub const DECODE_FAILED: &str = "decode.failed";
    pub const DECODE_DROPPED: &str = "decode.dropped";
    pub const UPLOAD_FAILED: &str = "upload.failed";
    pub const EVICTED: &str = "cache.evicted_parts";
    pub const FRAMES: &str = "render.frames";
    pub const FRAME_FAILED: &str = "render.frame_failed";
    pub const DRAW_FAILURES: &str = "render.draw_failures";
    pub const DRAWS_PER_FRAME: &str = "render.draws_per_frame";
    pub const CAMERA_PUSHES: &str = "camera.pushes";
    pub const CAMERA_PUSH_FAILED: &str = "camera.push_failed";

    pub const CACHE_ENTRIES: &str = "cache.entries";
    pub const RESIDENT_PARTS: &str = "cache.resident_parts";
    pub const PENDING_DECODES: &str = "decode.pending";
    pub const IN_FLIGHT: &str = "session.in_flight";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewerError {
    #[error("invalid host event: {0}")]
    InvalidEvent(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMouseAction {
    Down,
    Move,
    Up,
    Wheel,
}

impl From<HostMouseAction> for MouseAction {
    fn from(action: HostMouseAction) -> Self {
        match action {
            HostMouseAction::Down => MouseAction::Down,
            HostMouseAction::Move => MouseAction::Move,
            HostMouseAction::Up => MouseAction::Up,
            HostMouseAction::Wheel => MouseAction::Wheel,
        }
    }
}

/// Events the host container delivers between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// The server scene changed; poll now.
    InvalidateScene,
    /// Draw on the next tick even while inactive.
    Render,
    Mouse {
        action: HostMouseAction,
        #[serde(default)]
        button: u8,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        delta: f64,
    },
    Active {
        active: bool,
    },
}

impl HostEvent {
    pub fn from_json(text: &str) -> Result<Self, ViewerError> {
        serde_json::from_str(text).map_err(|e| ViewerError::InvalidEvent(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum ViewerStatus {
    Running,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerStats {
    pub status: ViewerStatus,
    pub scene_revision: u64,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub frame_index: u64,
    pub polled: bool,
    pub completions: usize,
    pub decoded: u32,
    pub frame: Option<FrameStats>,
}

enum Completion {
    Metadata(Result<String, TransportError>),
    Part {
        request: FetchRequest,
        result: Result<String, TransportError>,
    },
    CameraPush(Result<String, TransportError>),
}

pub struct Viewer<B: GpuBackend, O: Overlay2d, S: SessionChannel> {
    config: ViewerConfig,
    session: S,
    pipeline: Option<RenderPipeline<B>>,
    overlay: O,
    status: ViewerStatus,
    scene: SceneGraph,
    cache: ObjectCache<GpuPrimitive>,
    interaction: InteractionController,
    poll: PollGate,
    decodes: DecodeQueue,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, Completion>>,
    events: EventBus<HostEvent>,
    frame: Frame,
    metrics: Metrics,
    active: bool,
    render_requested: bool,
    camera_push_pending: bool,
    last_camera_push: Option<Time>,
}

impl<B: GpuBackend, O: Overlay2d, S: SessionChannel> Viewer<B, O, S> {
    pub fn new(config: ViewerConfig, backend: B, overlay: O, session: S) -> Self {
        let render = config.render();
        let mut viewer = Self::without_renderer(config, overlay, session);
        match RenderPipeline::new(backend, render) {
            Ok(pipeline) => viewer.pipeline = Some(pipeline),
            Err(err) => viewer.fail(&err),
        }
        viewer
    }

    /// A viewer whose graphics backend could not be created. It never polls
    /// or draws.
    pub fn unsupported(config: ViewerConfig, overlay: O, session: S, error: GpuError) -> Self {
        let mut viewer = Self::without_renderer(config, overlay, session);
        viewer.fail(&error);
        viewer
    }

    fn without_renderer(config: ViewerConfig, overlay: O, session: S) -> Self {
        Self {
            interaction: InteractionController::new(config.interaction()),
            poll: PollGate::new(config.poll_interval_ms),
            decodes: DecodeQueue::new(config.max_pending_decodes),
            config,
            session,
            pipeline: None,
            overlay,
            status: ViewerStatus::Running,
            scene: SceneGraph::new(),
            cache: ObjectCache::new(),
            in_flight: FuturesUnordered::new(),
            events: EventBus::new(),
            frame: Frame::first(Time(0.0)),
            metrics: Metrics::new(),
            active: true,
            render_requested: false,
            camera_push_pending: false,
            last_camera_push: None,
        }
    }

    fn fail(&mut self, error: &GpuError) {
        tracing::error!(error = %error, "renderer unavailable");
        self.status = ViewerStatus::Failed(UNSUPPORTED_MESSAGE.to_string());
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn cache(&self) -> &ObjectCache<GpuPrimitive> {
        &self.cache
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn pipeline(&self) -> Option<&RenderPipeline<B>> {
        self.pipeline.as_ref()
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn emit(&mut self, event: HostEvent) {
        self.events.emit(self.frame, event);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.set_size(width, height);
        }
    }

    pub fn tick(&mut self, now_ms: f64) -> TickReport {
        let now = Time::from_millis(now_ms);
        self.frame = self.frame.next(now);
        let mut report = TickReport {
            frame_index: self.frame.index,
            ..TickReport::default()
        };
        if self.pipeline.is_none() {
            self.events.drain();
            return report;
        }

        for stamped in self.events.drain() {
            self.handle_event(stamped.event);
        }
        report.polled = self.maybe_poll(now);
        report.completions = self.poll_in_flight();
        report.decoded = self.run_decodes();
        self.maybe_push_camera(now);

        if self.active || self.render_requested {
            report.frame = self.draw();
        }
        self.render_requested = false;
        self.update_gauges();
        report
    }

    pub fn stats(&self) -> ViewerStats {
        ViewerStats {
            status: self.status.clone(),
            scene_revision: self.scene.revision(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// [`stats`](Self::stats) as JSON for the host.
    pub fn stats_json(&self) -> String {
        serde_json::to_string(&self.stats()).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "stats serialization failed");
            String::from("{}")
        })
    }

    fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::InvalidateScene => self.poll.invalidate(),
            HostEvent::Render => self.render_requested = true,
            HostEvent::Active { active } => {
                tracing::debug!(active, "viewer activity changed");
                self.active = active;
            }
            HostEvent::Mouse {
                action,
                button,
                x,
                y,
                delta,
            } => {
                let event = MouseEvent {
                    action: action.into(),
                    button,
                    x,
                    y,
                    delta,
                };
                let depth = self.scene.world_depth() as f32;
                if self.interaction.handle(event, depth) == InteractionOutcome::DragEnded
                    && self.config.push_camera
                {
                    self.camera_push_pending = true;
                }
            }
        }
    }

    fn maybe_poll(&mut self, now: Time) -> bool {
        match self.poll.check(now, self.interaction.is_dragging(), self.active) {
            PollDecision::Poll => {
                self.poll.begin(now);
                let call = self.session.get_scene_metadata(&self.config.view_id);
                self.in_flight.push(call.map(Completion::Metadata).boxed_local());
                self.metrics.inc(metric::POLLS);
                true
            }
            decision => {
                tracing::trace!(?decision, "metadata poll skipped");
                false
            }
        }
    }

    /// Polls every in-flight call once. Calls issued while handling the
    /// completions are first polled on the next tick.
    fn poll_in_flight(&mut self) -> usize {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut completed = Vec::new();
        while let Poll::Ready(Some(completion)) = self.in_flight.poll_next_unpin(&mut cx) {
            completed.push(completion);
        }
        let count = completed.len();
        for completion in completed {
            self.complete(completion);
        }
        count
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Metadata(result) => {
                self.poll.finish();
                match result {
                    Ok(text) => match SceneDescriptor::from_json(&text) {
                        Ok(descriptor) => self.apply_descriptor(&descriptor),
                        Err(err) => {
                            tracing::warn!(error = %err, "scene metadata rejected");
                            self.metrics.inc(metric::SCENE_INVALID);
                        }
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "scene metadata poll failed");
                        self.metrics.inc(metric::POLL_FAILED);
                    }
                }
            }
            Completion::Part { request, result } => match result {
                Ok(payload) => {
                    if self.cache.begin_decode(&request.token) == FetchOutcome::StaleFetchDiscard {
                        tracing::debug!(token = %request.token, "stale fetch discarded");
                        self.metrics.inc(metric::STALE_DISCARDS);
                        return;
                    }
                    if let Err(full) = self.decodes.try_submit(&request, payload) {
                        tracing::warn!(token = %request.token, error = %full, "decode queue full");
                        self.cache.mark_failed(&request.token);
                        self.metrics.inc(metric::DECODE_DROPPED);
                    }
                }
                Err(err) => {
                    if self.cache.mark_failed(&request.token) {
                        tracing::warn!(token = %request.token, error = %err, "part fetch failed");
                        self.metrics.inc(metric::FETCH_FAILED);
                    } else {
                        self.metrics.inc(metric::STALE_DISCARDS);
                    }
                }
            },
            Completion::CameraPush(result) => {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "camera push failed");
                    self.metrics.inc(metric::CAMERA_PUSH_FAILED);
                }
            }
        }
    }

    fn apply_descriptor(&mut self, descriptor: &SceneDescriptor) {
        let update = self.scene.update(descriptor);
        if update.camera_reset {
            self.interaction.reset();
            self.metrics.inc(metric::CAMERA_RESETS);
        }

        for request in self.cache.reconcile(descriptor) {
            self.fetch(request);
        }

        let cache = &self.cache;
        let dropped = self.decodes.discard_stale(|token| cache.is_current(token));
        if dropped > 0 {
            self.metrics.inc_counter(metric::STALE_DISCARDS, dropped as u64);
        }
        self.collect_garbage();
    }

    fn fetch(&mut self, request: FetchRequest) {
        let call = self
            .session
            .get_webgl_data(&self.config.view_id, request.token.id(), request.token.part);
        self.metrics.inc(metric::FETCHES);
        self.in_flight
            .push(call.map(move |result| Completion::Part { request, result }).boxed_local());
    }

    fn collect_garbage(&mut self) {
        let referenced = self.scene.referenced_keys();
        let evicted = self.cache.garbage_collect(&referenced);
        if evicted.is_empty() {
            return;
        }
        self.metrics.inc_counter(metric::EVICTED, evicted.len() as u64);
        if let Some(pipeline) = self.pipeline.as_mut() {
            for (_, primitive) in evicted {
                pipeline.release(primitive);
            }
        }
    }

    fn run_decodes(&mut self) -> u32 {
        let mut budget = FrameBudget::new(self.config.decode_budget_per_tick);
        let mut decoded = 0;
        while let Some(job) = self.decodes.pop_next_with_budget(&mut budget) {
            if self.decode(job) {
                decoded += 1;
            }
        }
        decoded
    }

    fn decode(&mut self, job: DecodeJob) -> bool {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return false;
        };
        if !self.cache.is_current(&job.token) {
            self.metrics.inc(metric::STALE_DISCARDS);
            return false;
        }

        let primitive = match decode_payload(&job.payload) {
            Ok(primitive) => primitive,
            Err(err) => {
                tracing::warn!(token = %job.token, error = %err, "part decode failed");
                self.cache.mark_failed(&job.token);
                self.metrics.inc(metric::DECODE_FAILED);
                return false;
            }
        };
        let kind = primitive.kind();
        let uploaded = match pipeline.upload(primitive) {
            Ok(uploaded) => uploaded,
            Err(err) => {
                tracing::warn!(token = %job.token, kind, error = %err, "part upload failed");
                self.cache.mark_failed(&job.token);
                self.metrics.inc(metric::UPLOAD_FAILED);
                return false;
            }
        };

        match self.cache.insert(&job.token, uploaded) {
            Ok(Inserted::Complete) => {
                self.metrics.inc(metric::DECODED);
                self.collect_garbage();
                true
            }
            Ok(Inserted::Partial { .. }) => {
                self.metrics.inc(metric::DECODED);
                true
            }
            Err(rejected) => {
                tracing::debug!(token = %job.token, error = %rejected.error, "decoded part rejected");
                pipeline.release(rejected.primitive);
                self.metrics.inc(metric::STALE_DISCARDS);
                false
            }
        }
    }

    fn maybe_push_camera(&mut self, now: Time) {
        if !self.camera_push_pending {
            return;
        }
        if let Some(last) = self.last_camera_push
            && now.millis_since(last) < self.config.camera_push_interval_ms
        {
            return;
        }
        self.camera_push_pending = false;
        let Some(camera) = self.scene.world_camera() else {
            return;
        };
        let pose = self.interaction.effective_camera(camera, self.scene.center());
        let call = self.session.update_camera(
            &self.config.view_id,
            pose.focal_point,
            pose.view_up,
            pose.eye,
        );
        self.in_flight.push(call.map(Completion::CameraPush).boxed_local());
        self.last_camera_push = Some(now);
        self.metrics.inc(metric::CAMERA_PUSHES);
    }

    fn draw(&mut self) -> Option<FrameStats> {
        let pipeline = self.pipeline.as_mut()?;
        match pipeline.draw(
            &self.scene,
            &self.cache,
            self.interaction.transform(),
            &mut self.overlay,
        ) {
            Ok(stats) => {
                self.metrics.inc(metric::FRAMES);
                if stats.failures > 0 {
                    self.metrics.inc_counter(metric::DRAW_FAILURES, u64::from(stats.failures));
                }
                self.metrics.record_histogram(metric::DRAWS_PER_FRAME, i64::from(stats.draws));
                Some(stats)
            }
            Err(err) => {
                tracing::warn!(error = %err, "frame failed");
                self.metrics.inc(metric::FRAME_FAILED);
                None
            }
        }
    }

    fn update_gauges(&mut self) {
        self.metrics.set_gauge(metric::CACHE_ENTRIES, self.cache.len() as i64);
        self.metrics
            .set_gauge(metric::RESIDENT_PARTS, self.cache.resident_parts() as i64);
        self.metrics.set_gauge(metric::PENDING_DECODES, self.decodes.len() as i64);
        self.metrics.set_gauge(metric::IN_FLIGHT, self.in_flight.len() as i64);
    }
}
