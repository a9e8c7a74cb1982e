//! Per-frame robot tracking.
//!
//! The robot carries a blue marker at the front and a green one at the
//! rear. Every frame both are located, their midpoint is projected into the
//! arena and the heading is taken from the rear-to-front direction. When a
//! marker is lost or the pair is implausibly far apart, the lost marker is
//! extrapolated from its last two positions.

use super::calibration::{self, Calibration};
use super::frame::{self, FrameSource};
use super::marker::{self, BLUE, GREEN, Region};
use super::transform::{heading_from_markers, pixel_to_arena};
use crate::config::{ArenaConfig, CameraConfig, DishaConfig};
use crate::core::types::{Point, Pose};
use crate::error::{DishaError, Result};
use crate::fusion::ExternalPoseSource;
use crate::pose_log::PoseLog;
use crate::trace::{self, TraceCanvas};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const FRONT: usize = 0;
const FRONT_PREVIOUS: usize = 1;
const REAR: usize = 2;
const REAR_PREVIOUS: usize = 3;
const MEDIAN: usize = 4;
const MEDIAN_PREVIOUS: usize = 5;

/// Current and previous pixel positions of both markers and their midpoint.
/// A slot is `None` until the marker has been observed or recovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackedMarkers {
    slots: [Option<Point>; 6],
}

impl TrackedMarkers {
    pub fn slots(&self) -> &[Option<Point>; 6] {
        &self.slots
    }

    pub fn front(&self) -> Option<Point> {
        self.slots[FRONT]
    }

    pub fn rear(&self) -> Option<Point> {
        self.slots[REAR]
    }

    pub fn median(&self) -> Option<Point> {
        self.slots[MEDIAN]
    }

    pub fn median_previous(&self) -> Option<Point> {
        self.slots[MEDIAN_PREVIOUS]
    }

    /// Best guess for the front marker when it could not be tracked
    pub fn recover_front(&self) -> Option<Point> {
        extrapolate(self.slots[FRONT], self.slots[FRONT_PREVIOUS])
    }

    pub fn recover_rear(&self) -> Option<Point> {
        extrapolate(self.slots[REAR], self.slots[REAR_PREVIOUS])
    }

    /// Shift current to previous and record a new observation
    pub fn advance(&mut self, front: Option<Point>, rear: Option<Point>) {
        self.slots[FRONT_PREVIOUS] = self.slots[FRONT];
        self.slots[REAR_PREVIOUS] = self.slots[REAR];
        self.slots[MEDIAN_PREVIOUS] = self.slots[MEDIAN];
        self.slots[FRONT] = front;
        self.slots[REAR] = rear;
        self.slots[MEDIAN] = front
            .zip(rear)
            .map(|(f, r)| Point::new((f.x + r.x).div_euclid(2), (f.y + r.y).div_euclid(2)));
    }
}

/// Constant-velocity extrapolation, or the last position without history
pub fn extrapolate(last: Option<Point>, second_last: Option<Point>) -> Option<Point> {
    match (last, second_last) {
        (Some(l), Some(s)) => Some(Point::new(2 * l.x - s.x, 2 * l.y - s.y)),
        (last, _) => last,
    }
}

/// Marker paths drawn in camera pixels and in arena millimetres
struct MarkerTraces {
    pixel: TraceCanvas,
    arena: TraceCanvas,
    pixel_path: PathBuf,
    arena_path: PathBuf,
    debug: bool,
}

impl MarkerTraces {
    fn outline(&mut self, calibration: &Calibration) {
        let corners = calibration.corners();
        for (&from, &to) in corners.iter().zip(corners.iter().cycle().skip(1)) {
            self.pixel.draw_line(from, to, trace::BLUE);
        }
    }

    fn draw(&mut self, pixel: &[Option<Point>; 6], arena: &[Option<Point>; 6], recovered: bool) {
        let debug = self.debug;
        draw_slots(&mut self.pixel, pixel, recovered, debug);
        draw_slots(&mut self.arena, arena, recovered, debug);
    }

    fn save(&self) -> Result<()> {
        self.pixel.save(&self.pixel_path)?;
        self.arena.save(&self.arena_path)?;
        info!("Tracker traces written to {:?} and {:?}", self.pixel_path, self.arena_path);
        Ok(())
    }
}

fn draw_slots(canvas: &mut TraceCanvas, slots: &[Option<Point>; 6], recovered: bool, debug: bool) {
    let mut segment = |from: usize, to: usize, colour| {
        if let (Some(from), Some(to)) = (slots[from], slots[to]) {
            canvas.draw_line(from, to, colour);
        }
    };
    if debug {
        segment(FRONT_PREVIOUS, FRONT, trace::BLUE);
        segment(REAR_PREVIOUS, REAR, trace::YELLOW);
    }
    let colour = if recovered { trace::YELLOW } else { trace::WHITE };
    segment(MEDIAN_PREVIOUS, MEDIAN, colour);
}

/// Result of one tracking update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub markers: TrackedMarkers,
    /// All six marker slots in arena millimetres
    pub arena: [Option<Point>; 6],
    pub pose: Pose,
    /// At least one marker was extrapolated
    pub recovered: bool,
}

/// Tracker output shared with other threads
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackerState {
    pub pose: Option<Pose>,
    /// The pose came from a successful strict localization
    pub located: bool,
    pub frames: u64,
    pub recovered_frames: u64,
}

struct TrackerShared {
    state: Mutex<TrackerState>,
    stop: AtomicBool,
}

/// Cloneable view of the tracker for readers and for stopping it
#[derive(Clone)]
pub struct TrackerHandle {
    inner: Arc<TrackerShared>,
}

impl TrackerHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(TrackerShared {
                state: Mutex::new(TrackerState::default()),
                stop: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> TrackerState {
        *self.inner.state.lock()
    }

    pub fn pose(&self) -> Option<Pose> {
        self.inner.state.lock().pose
    }

    pub fn is_located(&self) -> bool {
        self.inner.state.lock().located
    }

    /// Ask the tracker thread to exit after its current frame
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::Relaxed);
    }

    pub fn should_stop(&self) -> bool {
        self.inner.stop.load(Ordering::Relaxed)
    }
}

impl ExternalPoseSource for TrackerHandle {
    fn estimate(&self) -> Option<Pose> {
        self.pose()
    }
}

pub struct VisionLocalizer {
    source: Box<dyn FrameSource>,
    arena: ArenaConfig,
    camera: CameraConfig,
    calibration: Option<Calibration>,
    calibration_path: Option<PathBuf>,
    markers: TrackedMarkers,
    heading: f64,
    log: Option<PoseLog>,
    traces: Option<MarkerTraces>,
    handle: TrackerHandle,
}

impl VisionLocalizer {
    pub fn new(source: Box<dyn FrameSource>, arena: ArenaConfig, camera: CameraConfig) -> Self {
        Self {
            source,
            arena,
            camera,
            calibration: None,
            calibration_path: None,
            markers: TrackedMarkers::default(),
            heading: 0.0,
            log: None,
            traces: None,
            handle: TrackerHandle::new(),
        }
    }

    /// Localizer wired to the configured calibration file and tracking log
    pub fn from_config(source: Box<dyn FrameSource>, config: &DishaConfig) -> Result<Self> {
        let mut localizer = Self::new(source, config.arena.clone(), config.camera.clone());
        localizer.calibration_path = Some(config.output.calibration_path());
        if config.output.store_positions {
            localizer.log = Some(PoseLog::create(&config.output.tracking_log_path())?);
        }
        localizer.enable_traces(
            config.output.tracker_trace_path(),
            config.output.tracker_arena_trace_path(),
            config.output.debug,
        );
        Ok(localizer)
    }

    /// Draw marker traces while tracking; they are written by `save_traces`
    /// and when the tracker thread stops
    pub fn enable_traces(&mut self, pixel_path: PathBuf, arena_path: PathBuf, debug: bool) {
        let mut traces = MarkerTraces {
            pixel: TraceCanvas::new(self.camera.width, self.camera.height),
            arena: TraceCanvas::new(
                self.arena.width_mm.max(1.0) as u32,
                self.arena.height_mm.max(1.0) as u32,
            ),
            pixel_path,
            arena_path,
            debug,
        };
        if let Some(calibration) = &self.calibration {
            traces.outline(calibration);
        }
        self.traces = Some(traces);
    }

    pub fn save_traces(&self) -> Result<()> {
        match &self.traces {
            Some(traces) => traces.save(),
            None => Ok(()),
        }
    }

    fn adopt(&mut self, calibration: Calibration) {
        if let Some(traces) = self.traces.as_mut() {
            traces.outline(&calibration);
        }
        self.calibration = Some(calibration);
    }

    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.adopt(calibration);
    }

    /// Use a previously saved calibration
    pub fn load_calibration(&mut self, path: &Path) -> Result<Calibration> {
        let calibration = calibration::load_calibration(path)?;
        info!("Loaded calibration from {:?}: {:?}", path, calibration.corners());
        self.adopt(calibration);
        Ok(calibration)
    }

    pub fn markers(&self) -> &TrackedMarkers {
        &self.markers
    }

    fn grab_prepared(&mut self) -> Result<image::RgbImage> {
        let frame = self.source.grab()?;
        frame::prepare(&frame, &self.camera)
    }

    /// Detect the arena corners in a fresh frame.
    ///
    /// The detection report is written to the calibration file even when a
    /// corner is missing; the localizer only adopts a complete calibration.
    pub fn calibrate(&mut self) -> Result<Calibration> {
        let prepared = self.grab_prepared()?;
        let detections = calibration::detect_corners(&prepared, &self.arena, &self.camera);
        if let Some(path) = &self.calibration_path {
            calibration::save_calibration(path, &detections)?;
            debug!("Calibration report written to {:?}", path);
        }
        let calibration = Calibration::from_detections(&detections)?;
        info!("Calibrated arena corners: {:?}", calibration.corners());
        self.adopt(calibration);
        Ok(calibration)
    }

    fn ensure_calibrated(&mut self) -> Result<Calibration> {
        match self.calibration {
            Some(calibration) => Ok(calibration),
            None => {
                info!("Not calibrated yet, calibrating");
                self.calibrate()
            }
        }
    }

    fn find_markers(&self, prepared: &image::RgbImage) -> (Option<Point>, Option<Point>) {
        let whole = Region::whole(prepared);
        let bounds = (self.camera.width, self.camera.height);
        (
            marker::locate_marker(prepared, whole, BLUE, bounds),
            marker::locate_marker(prepared, whole, GREEN, bounds),
        )
    }

    fn project(&self, calibration: &Calibration) -> [Option<Point>; 6] {
        self.markers
            .slots()
            .map(|p| p.map(|p| pixel_to_arena(p, calibration, self.arena.width_mm, self.arena.height_mm)))
    }

    fn pose_from(&mut self, arena: &[Option<Point>; 6]) -> Option<Pose> {
        let location = arena[MEDIAN]?;
        if let (Some(front), Some(rear)) = (arena[FRONT], arena[REAR])
            && let Some(heading) = heading_from_markers(front, rear)
        {
            self.heading = heading;
        }
        Some(Pose {
            location,
            heading: self.heading,
        })
    }

    /// Track the robot in one new frame
    pub fn update(&mut self) -> Result<TrackSample> {
        let calibration = self.ensure_calibrated()?;
        let prepared = self.grab_prepared()?;

        let max_distance = self.arena.max_marker_distance_px;
        let (front, rear, recovered) = match self.find_markers(&prepared) {
            (Some(front), Some(rear)) if front.distance(&rear) <= max_distance => {
                (Some(front), Some(rear), false)
            }
            (Some(front), Some(rear)) => {
                warn!(
                    "Markers {} and {} are {:.0} px apart, extrapolating",
                    front,
                    rear,
                    front.distance(&rear)
                );
                (self.markers.recover_front(), self.markers.recover_rear(), true)
            }
            (front, rear) => {
                if front.is_none() {
                    warn!("Front marker not found, extrapolating");
                }
                if rear.is_none() {
                    warn!("Rear marker not found, extrapolating");
                }
                (
                    front.or_else(|| self.markers.recover_front()),
                    rear.or_else(|| self.markers.recover_rear()),
                    true,
                )
            }
        };

        self.markers.advance(front, rear);
        let arena = self.project(&calibration);
        let pose = self
            .pose_from(&arena)
            .ok_or_else(|| DishaError::Tracking("robot markers have never been seen".to_string()))?;

        {
            let mut state = self.handle.inner.state.lock();
            state.pose = Some(pose);
            state.frames += 1;
            if recovered {
                state.recovered_frames += 1;
            }
        }
        if let Some(log) = self.log.as_mut()
            && let Err(e) = log.append(&pose)
        {
            warn!("Failed to write tracking log: {}", e);
        }
        if let Some(traces) = self.traces.as_mut() {
            traces.draw(self.markers.slots(), &arena, recovered);
        }

        Ok(TrackSample {
            markers: self.markers,
            arena,
            pose,
            recovered,
        })
    }

    /// Strict one-shot localization: both markers must be found and plausible
    pub fn locate_robot(&mut self) -> Result<Pose> {
        let calibration = self.ensure_calibrated()?;
        let prepared = self.grab_prepared()?;

        let (front, rear) = match self.find_markers(&prepared) {
            (Some(front), Some(rear)) => (front, rear),
            (None, _) => return Err(DishaError::Tracking("front (blue) marker not found".to_string())),
            (_, None) => return Err(DishaError::Tracking("rear (green) marker not found".to_string())),
        };
        let distance = front.distance(&rear);
        if distance > self.arena.max_marker_distance_px {
            return Err(DishaError::Tracking(format!(
                "markers {:.0} px apart, limit {:.0}",
                distance, self.arena.max_marker_distance_px
            )));
        }

        self.markers.advance(Some(front), Some(rear));
        let arena = self.project(&calibration);
        let pose = self
            .pose_from(&arena)
            .ok_or_else(|| DishaError::Tracking("projection failed".to_string()))?;

        {
            let mut state = self.handle.inner.state.lock();
            state.pose = Some(pose);
            state.located = true;
        }
        info!("Robot located at {}", pose);
        Ok(pose)
    }

    /// Run `update` on a dedicated thread until the handle is stopped
    pub fn spawn(mut self, interval: Duration) -> TrackerThread {
        let handle = self.handle();
        let join = thread::Builder::new()
            .name("tracker".into())
            .spawn(move || {
                info!("Tracker thread started");
                while !self.handle.should_stop() {
                    if let Err(e) = self.update() {
                        warn!("Tracking update failed: {}", e);
                    }
                    thread::sleep(interval);
                }
                if let Err(e) = self.save_traces() {
                    error!("Failed to write tracker traces: {}", e);
                }
                info!("Tracker thread stopped");
                self
            })
            .expect("Failed to spawn tracker thread");

        TrackerThread {
            handle,
            join: Some(join),
        }
    }
}

/// Running tracker thread
pub struct TrackerThread {
    handle: TrackerHandle,
    join: Option<JoinHandle<VisionLocalizer>>,
}

impl TrackerThread {
    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Stop the thread, writing the marker traces, and take the localizer back
    pub fn stop(&mut self) -> Option<VisionLocalizer> {
        self.handle.stop();
        let join = self.join.take()?;
        match join.join() {
            Ok(localizer) => Some(localizer),
            Err(_) => {
                error!("Tracker thread panicked");
                None
            }
        }
    }
}

impl Drop for TrackerThread {
    fn drop(&mut self) {
        self.stop();
    }
}
