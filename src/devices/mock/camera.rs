//! Synthetic overhead camera
//!
//! Renders the arena as seen from above: black floor, a yellow square in
//! each corner and the robot's blue (front) and green (rear) discs. The
//! arena is scaled uniformly to fit the region of interest with a margin.

use super::SimHandle;
use crate::config::{ArenaConfig, CameraConfig, SimulationConfig};
use crate::error::{DishaError, Result};
use crate::vision::FrameSource;
use image::{Rgb, RgbImage};

const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const BLUE: Rgb<u8> = Rgb([0, 170, 255]);
const GREEN: Rgb<u8> = Rgb([110, 255, 0]);

pub struct SyntheticCamera {
    sim: SimHandle,
    frame_width: u32,
    frame_height: u32,
    /// Pixel position of the arena origin in the full frame
    origin: (f64, f64),
    /// Pixels per mm
    scale: f64,
    arena: (f64, f64),
    marker_size_mm: f64,
    marker_offset_mm: f64,
    marker_radius_mm: f64,
}

impl SyntheticCamera {
    pub fn new(sim: SimHandle, arena: &ArenaConfig, camera: &CameraConfig, simulation: &SimulationConfig) -> Self {
        let margin = simulation.margin_px as f64;
        let usable_w = (camera.width as f64 - 2.0 * margin).max(1.0);
        let usable_h = (camera.height as f64 - 2.0 * margin).max(1.0);
        let scale = (usable_w / arena.width_mm).min(usable_h / arena.height_mm);

        // Centre the arena inside the ROI
        let origin = (
            camera.offx as f64 + (camera.width as f64 - arena.width_mm * scale) / 2.0,
            camera.offy as f64 + (camera.height as f64 - arena.height_mm * scale) / 2.0,
        );

        Self {
            sim,
            frame_width: camera.offx + camera.width,
            frame_height: camera.offy + camera.height,
            origin,
            scale,
            arena: (arena.width_mm, arena.height_mm),
            marker_size_mm: arena.marker_size_mm as f64,
            marker_offset_mm: simulation.marker_offset_mm,
            marker_radius_mm: simulation.marker_radius_mm,
        }
    }

    /// Full-frame pixel of an arena point
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (self.origin.0 + x * self.scale, self.origin.1 + y * self.scale)
    }

    fn fill_rect(img: &mut RgbImage, x0: f64, y0: f64, x1: f64, y1: f64, colour: Rgb<u8>) {
        let (w, h) = (img.width() as i64, img.height() as i64);
        let xs = (x0.round() as i64).max(0)..(x1.round() as i64).min(w);
        let ys = (y0.round() as i64).max(0)..(y1.round() as i64).min(h);
        for y in ys {
            for x in xs.clone() {
                img.put_pixel(x as u32, y as u32, colour);
            }
        }
    }

    fn fill_disc(img: &mut RgbImage, cx: f64, cy: f64, radius: f64, colour: Rgb<u8>) {
        let (w, h) = (img.width() as i64, img.height() as i64);
        let r2 = radius * radius;
        for y in ((cy - radius).floor() as i64).max(0)..=((cy + radius).ceil() as i64).min(h - 1) {
            for x in ((cx - radius).floor() as i64).max(0)..=((cx + radius).ceil() as i64).min(w - 1) {
                let (dx, dy) = (x as f64 - cx, y as f64 - cy);
                if dx * dx + dy * dy <= r2 {
                    img.put_pixel(x as u32, y as u32, colour);
                }
            }
        }
    }

    /// Render the current simulated scene
    pub fn render(&self, hide_front: bool) -> RgbImage {
        let mut img = RgbImage::new(self.frame_width, self.frame_height);

        // Corner markers sit inside the arena with their outer corner on the arena corner
        let side = self.marker_size_mm;
        let (aw, ah) = self.arena;
        for (x0, y0) in [(0.0, 0.0), (0.0, ah - side), (aw - side, ah - side), (aw - side, 0.0)] {
            let (px0, py0) = self.to_pixel(x0, y0);
            let (px1, py1) = self.to_pixel(x0 + side, y0 + side);
            Self::fill_rect(&mut img, px0, py0, px1, py1, YELLOW);
        }

        let state = self.sim.physics();
        let heading = state.heading.to_radians();
        let (dx, dy) = (heading.cos() * self.marker_offset_mm, heading.sin() * self.marker_offset_mm);
        let radius = self.marker_radius_mm * self.scale;

        let (rx, ry) = self.to_pixel(state.x - dx, state.y - dy);
        Self::fill_disc(&mut img, rx, ry, radius, GREEN);
        if !hide_front {
            let (fx, fy) = self.to_pixel(state.x + dx, state.y + dy);
            Self::fill_disc(&mut img, fx, fy, radius, BLUE);
        }
        img
    }
}

impl FrameSource for SyntheticCamera {
    fn grab(&mut self) -> Result<RgbImage> {
        let faults = self.sim.take_camera_faults();
        if faults.drop_frame {
            return Err(DishaError::FrameGrab("camera returned no frame".to_string()));
        }
        Ok(self.render(faults.hide_front))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DishaConfig;
    use crate::devices::mock::SimulatedEpuck;

    #[test]
    fn test_arena_fits_roi() {
        let config = DishaConfig::default();
        let robot = SimulatedEpuck::new(&config);
        let camera = SyntheticCamera::new(robot.handle(), &config.arena, &config.camera, &config.simulation);
        let (x0, y0) = camera.to_pixel(0.0, 0.0);
        let (x1, y1) = camera.to_pixel(config.arena.width_mm, config.arena.height_mm);
        assert!(x0 >= 20.0 && y0 >= 20.0);
        assert!(x1 <= 620.0 && y1 <= 460.0);
    }

    #[test]
    fn test_render_contains_markers() {
        let config = DishaConfig::default();
        let robot = SimulatedEpuck::new(&config);
        let mut camera = SyntheticCamera::new(robot.handle(), &config.arena, &config.camera, &config.simulation);
        let img = camera.grab().unwrap();
        assert_eq!(img.dimensions(), (640, 480));

        let (cx, cy) = camera.to_pixel(5.0, 5.0);
        assert_eq!(*img.get_pixel(cx as u32, cy as u32), YELLOW);
        let (fx, fy) = camera.to_pixel(config.simulation.start_x + 20.0, config.simulation.start_y);
        assert_eq!(*img.get_pixel(fx.round() as u32, fy.round() as u32), BLUE);
    }

    #[test]
    fn test_dropped_frame() {
        let config = DishaConfig::default();
        let robot = SimulatedEpuck::new(&config);
        let handle = robot.handle();
        let mut camera = SyntheticCamera::new(handle.clone(), &config.arena, &config.camera, &config.simulation);
        handle.drop_frames(1);
        assert!(camera.grab().is_err());
        assert!(camera.grab().is_ok());
    }
}
