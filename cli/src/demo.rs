use log::trace;
use skia_safe::{Canvas, Color, Paint, PaintStyle, Point, RRect, Rect};
use std::f32::consts::TAU;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use vroverlay_core::overlay::OverlayContent;
use vroverlay_core::vr::IntSize;
use vroverlay_core::OverlayAppHandle;

const TICK_INTERVAL: Duration = Duration::from_millis(50);
const TICKS_PER_TURN: u32 = 120;

/// A sweeping dial and progress bar, redrawn on every tick.
#[derive(Default)]
pub struct DemoContent {
    tick: u32,
}

impl DemoContent {
    pub fn advance(&mut self) {
        self.tick = (self.tick + 1) % TICKS_PER_TURN;
    }

    fn progress(&self) -> f32 {
        self.tick as f32 / TICKS_PER_TURN as f32
    }
}

impl OverlayContent for DemoContent {
    fn draw(&mut self, canvas: &Canvas, size: IntSize) {
        let (width, height) = (size.width as f32, size.height as f32);
        let margin = width.min(height) * 0.05;

        let mut panel = Paint::default();
        panel.set_anti_alias(true);
        panel.set_color(Color::from_rgb(32, 36, 48));
        let bounds = Rect::from_xywh(margin, margin, width - 2.0 * margin, height - 2.0 * margin);
        canvas.draw_rrect(RRect::new_rect_xy(bounds, margin, margin), &panel);

        let center = Point::new(width / 2.0, height * 0.45);
        let radius = width.min(height) * 0.25;
        let mut ring = Paint::default();
        ring.set_anti_alias(true);
        ring.set_style(PaintStyle::Stroke);
        ring.set_stroke_width(radius * 0.1);
        ring.set_color(Color::from_rgb(90, 96, 112));
        canvas.draw_circle(center, radius, &ring);

        let angle = self.progress() * TAU - TAU / 4.0;
        let hand = center + Point::new(angle.cos() * radius, angle.sin() * radius);
        ring.set_color(Color::from_rgb(80, 200, 255));
        canvas.draw_line(center, hand, &ring);

        let mut bar = Paint::default();
        bar.set_color(Color::from_rgb(80, 200, 255));
        let bar_top = height * 0.8;
        let bar_width = (width - 4.0 * margin) * self.progress();
        canvas.draw_rect(
            Rect::from_xywh(2.0 * margin, bar_top, bar_width, margin),
            &bar,
        );
    }

    fn on_resize(&mut self, size: IntSize) {
        trace!("Demo content resized to {}x{}", size.width, size.height);
    }
}

/// Advances the demo from a worker thread until the application stops.
pub fn spawn_ticker(handle: OverlayAppHandle<DemoContent>) -> JoinHandle<()> {
    thread::spawn(move || {
        while handle.is_running() {
            handle.update(DemoContent::advance);
            thread::sleep(TICK_INTERVAL);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_wraps_after_a_full_turn() {
        let mut content = DemoContent::default();
        for _ in 0..TICKS_PER_TURN {
            content.advance();
        }
        assert_eq!(content.tick, 0);
        content.advance();
        assert!(content.progress() > 0.0);
    }
}
