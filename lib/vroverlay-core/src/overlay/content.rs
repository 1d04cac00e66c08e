use crate::vr::IntSize;
use skia_safe::Canvas;

/// What gets drawn onto an overlay. Runs on the loop thread only.
pub trait OverlayContent: 'static {
    fn draw(&mut self, canvas: &Canvas, size: IntSize);

    fn on_resize(&mut self, _size: IntSize) {}
}
