//! Trace recorder: draws the fused pose history into an arena-sized image.
//!
//! Segment colours:
//! - green: dead reckoning
//! - red: the pose was corrected during motion
//! - white: start-of-run or substituted pose (debug only)
//!
//! The recorder consumes and resets the correction flags of the shared
//! pose. The image is kept across recording sessions and written when a
//! session stops. The optional trace log receives every published pose
//! through a pose subscription.

use crate::config::DishaConfig;
use crate::core::types::Point;
use crate::error::Result;
use crate::pose_log::PoseLog;
use crate::shared::{CorrectionStatus, PoseSnapshot, SharedPose};
use crossbeam_channel::Receiver;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// Published poses buffered for the trace log between recorder ticks
const LOG_BACKLOG: usize = 4096;

/// What a traced segment represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    DeadReckoning,
    Correction,
    StartCorrection,
}

impl Segment {
    pub fn classify(status: CorrectionStatus) -> Self {
        match (status.position_corrected, status.start_corrected) {
            (false, _) => Segment::DeadReckoning,
            (true, false) => Segment::Correction,
            (true, true) => Segment::StartCorrection,
        }
    }

    /// Colour to draw with, `None` to skip the segment
    fn colour(self, debug: bool) -> Option<Rgb<u8>> {
        match self {
            Segment::DeadReckoning => Some(GREEN),
            Segment::Correction => Some(RED),
            Segment::StartCorrection => debug.then_some(WHITE),
        }
    }
}

/// Arena-sized image, one pixel per mm
pub struct TraceCanvas {
    image: RgbImage,
}

impl TraceCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width.max(1), height.max(1)),
        }
    }

    /// Continue an existing trace if one of the right size is on disk
    pub fn load_or_new(path: &Path, width: u32, height: u32) -> Self {
        match image::open(path) {
            Ok(existing) if existing.width() == width && existing.height() == height => {
                info!("Continuing trace from {:?}", path);
                Self {
                    image: existing.to_rgb8(),
                }
            }
            _ => Self::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Bresenham line, clipped to the image
    pub fn draw_line(&mut self, from: Point, to: Point, colour: Rgb<u8>) {
        let (w, h) = (self.image.width() as i32, self.image.height() as i32);
        let (mut x, mut y) = (from.x, from.y);
        let dx = (to.x - from.x).abs();
        let dy = -(to.y - from.y).abs();
        let sx = if from.x < to.x { 1 } else { -1 };
        let sy = if from.y < to.y { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            if x >= 0 && y >= 0 && x < w && y < h {
                self.image.put_pixel(x as u32, y as u32, colour);
            }
            if x == to.x && y == to.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.image.save(path)?;
        Ok(())
    }
}

/// Recorder parameters
#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub interval: Duration,
    pub debug: bool,
    pub image_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl TraceSettings {
    pub fn from_config(config: &DishaConfig) -> Self {
        Self {
            interval: config.run.trace_interval(),
            debug: config.output.debug,
            image_path: Some(config.output.trace_image_path()),
            log_path: config
                .output
                .store_positions
                .then(|| config.output.trace_log_path()),
        }
    }
}

/// Consume one pose sample and draw it
pub fn record_tick(pose: &SharedPose, canvas: &Mutex<TraceCanvas>, debug: bool) -> Segment {
    let snapshot = pose.take_snapshot();
    let segment = Segment::classify(snapshot.status);
    if let Some(colour) = segment.colour(debug) {
        canvas
            .lock()
            .draw_line(snapshot.previous.location, snapshot.current.location, colour);
    }
    segment
}

fn drain_to_log(poses: &Receiver<PoseSnapshot>, log: &mut PoseLog) {
    for snapshot in poses.try_iter() {
        if let Err(e) = log.append(&snapshot.current) {
            warn!("Failed to write trace log: {}", e);
            return;
        }
    }
}

/// Running trace recorder thread
pub struct TraceRecorder {
    active: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    canvas: Arc<Mutex<TraceCanvas>>,
    image_path: Option<PathBuf>,
}

impl TraceRecorder {
    pub fn start(pose: Arc<SharedPose>, canvas: Arc<Mutex<TraceCanvas>>, settings: TraceSettings) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let thread_active = Arc::clone(&active);
        let thread_canvas = Arc::clone(&canvas);
        let mut log = settings.log_path.as_deref().and_then(|path| match PoseLog::create(path) {
            Ok(log) => Some(log),
            Err(e) => {
                warn!("Trace log disabled: {}", e);
                None
            }
        });
        // The log gets every published pose, not one per tick
        let poses = log.as_ref().map(|_| pose.subscribe(LOG_BACKLOG));

        let join = thread::Builder::new()
            .name("trace".into())
            .spawn(move || {
                info!("Trace thread started");
                while thread_active.load(Ordering::Relaxed) {
                    let segment = record_tick(&pose, &thread_canvas, settings.debug);
                    if segment != Segment::DeadReckoning {
                        debug!("Traced {:?} segment", segment);
                    }
                    if let (Some(log), Some(poses)) = (log.as_mut(), poses.as_ref()) {
                        drain_to_log(poses, log);
                    }
                    thread::sleep(settings.interval);
                }
                if let (Some(log), Some(poses)) = (log.as_mut(), poses.as_ref()) {
                    drain_to_log(poses, log);
                }
                info!("Trace thread stopped");
            })
            .expect("Failed to spawn trace thread");

        Self {
            active,
            join: Some(join),
            canvas,
            image_path: settings.image_path,
        }
    }

    /// Stop the thread and write the image
    pub fn stop(&mut self) -> Result<()> {
        self.active.store(false, Ordering::Relaxed);
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        if join.join().is_err() {
            error!("Trace thread panicked");
        }
        if let Some(path) = &self.image_path {
            self.canvas.lock().save(path)?;
            info!("Trace written to {:?}", path);
        }
        Ok(())
    }
}

impl Drop for TraceRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Failed to write trace: {}", e);
        }
    }
}
