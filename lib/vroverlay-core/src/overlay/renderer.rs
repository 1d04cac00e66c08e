use crate::overlay::{OverlayContent, OverlayState};
use crate::vr::{IntSize, Overlay, VrError, VrResult};
use log::{debug, trace};
use skia_safe::{surfaces, AlphaType, Color, ColorType, ImageInfo, Surface};

const BYTES_PER_PIXEL: u32 = 4;

/// Draws overlay content into a raster surface and hands each frame to the compositor.
pub struct OverlayRenderer<C: OverlayContent> {
    overlay: Overlay,
    state: OverlayState,
    background: Color,
    content: C,
    surface: Option<Surface>,
    surface_size: IntSize,
    pixels: Vec<u8>,
    frames_rendered: u64,
}

impl<C: OverlayContent> OverlayRenderer<C> {
    pub fn new(overlay: Overlay, state: OverlayState, background: Color, content: C) -> Self {
        Self {
            overlay,
            state,
            background,
            content,
            surface: None,
            surface_size: IntSize::default(),
            pixels: Vec::new(),
            frames_rendered: 0,
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut C {
        &mut self.content
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// The surface is recreated on the next frame.
    pub fn resize(&mut self, size: IntSize) {
        self.state.size = size;
    }

    pub fn render(&mut self) -> VrResult<()> {
        self.ensure_surface()?;
        let size = self.surface_size;
        let dimensions = surface_dimensions(size)?;
        let surface = self
            .surface
            .as_mut()
            .ok_or_else(|| VrError::Render("No surface to render into".into()))?;

        let canvas = surface.canvas();
        canvas.clear(self.background);
        self.content.draw(canvas, size);

        let info = ImageInfo::new(
            dimensions,
            ColorType::RGBA8888,
            AlphaType::Unpremul,
            None,
        );
        let row_bytes = size.width as usize * BYTES_PER_PIXEL as usize;
        if !surface.read_pixels(&info, &mut self.pixels, row_bytes, (0, 0)) {
            return Err(VrError::Render("Could not read back surface pixels".into()));
        }

        self.overlay.set_raw(&self.pixels, size, BYTES_PER_PIXEL)?;
        self.frames_rendered += 1;
        trace!("Submitted frame {}", self.frames_rendered);
        Ok(())
    }

    fn ensure_surface(&mut self) -> VrResult<()> {
        let size = self.state.size;
        if self.surface.is_some() && self.surface_size == size {
            return Ok(());
        }
        if size.is_empty() {
            return Err(VrError::Render(format!("Overlay size {size:?} is empty")));
        }

        let surface = surfaces::raster_n32_premul(surface_dimensions(size)?)
            .ok_or_else(|| VrError::Render(format!("Could not create {size:?} surface")))?;
        self.surface = Some(surface);
        self.surface_size = size;
        self.pixels
            .resize(size.area() * BYTES_PER_PIXEL as usize, 0);
        self.content.on_resize(size);
        debug!("Created {}x{} overlay surface", size.width, size.height);
        Ok(())
    }
}

/// Skia takes signed dimensions.
fn surface_dimensions(size: IntSize) -> VrResult<(i32, i32)> {
    match (i32::try_from(size.width), i32::try_from(size.height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(VrError::Render(format!("Overlay size {size:?} is too large"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::mock::{MockRuntime, MockTexture};
    use crate::vr::{ApplicationType, VrRuntime};
    use skia_safe::{Canvas, Paint, Rect};

    #[derive(Default)]
    struct RedSquare {
        draws: u32,
        resizes: Vec<IntSize>,
    }

    impl OverlayContent for RedSquare {
        fn draw(&mut self, canvas: &Canvas, _size: IntSize) {
            let mut paint = Paint::default();
            paint.set_color(Color::RED);
            canvas.draw_rect(Rect::from_xywh(0.0, 0.0, 1.0, 1.0), &paint);
            self.draws += 1;
        }

        fn on_resize(&mut self, size: IntSize) {
            self.resizes.push(size);
        }
    }

    fn new_renderer(runtime: &MockRuntime, size: IntSize) -> OverlayRenderer<RedSquare> {
        runtime.init_internal(ApplicationType::Overlay).unwrap();
        let overlay = Overlay::create(runtime.overlay(), "renderer", "Renderer").unwrap();
        OverlayRenderer::new(
            overlay,
            OverlayState::new(size),
            Color::WHITE,
            RedSquare::default(),
        )
    }

    fn pixel(pixels: &[u8], width: u32, x: u32, y: u32) -> &[u8] {
        let offset = ((y * width + x) * BYTES_PER_PIXEL) as usize;
        &pixels[offset..offset + 4]
    }

    #[test]
    fn test_render_submits_rgba_frame() {
        let runtime = MockRuntime::new();
        let mut renderer = new_renderer(&runtime, IntSize::new(4, 3));
        renderer.render().unwrap();

        let snapshot = runtime
            .overlay_snapshot(renderer.overlay().handle())
            .unwrap();
        let Some(MockTexture::Raw { size, pixels }) = snapshot.texture else {
            panic!("expected a raw texture");
        };
        assert_eq!(size, IntSize::new(4, 3));
        assert_eq!(pixels.len(), 4 * 3 * 4);
        assert_eq!(pixel(&pixels, 4, 0, 0), &[255, 0, 0, 255]);
        assert_eq!(pixel(&pixels, 4, 3, 2), &[255, 255, 255, 255]);
        assert_eq!(renderer.frames_rendered(), 1);
        assert_eq!(renderer.content().draws, 1);
    }

    #[test]
    fn test_resize_recreates_surface() {
        let runtime = MockRuntime::new();
        let mut renderer = new_renderer(&runtime, IntSize::new(4, 4));
        renderer.render().unwrap();
        renderer.render().unwrap();
        renderer.resize(IntSize::new(8, 2));
        renderer.render().unwrap();

        assert_eq!(
            renderer.content().resizes,
            vec![IntSize::new(4, 4), IntSize::new(8, 2)]
        );
        assert_eq!(
            renderer.overlay().texture_size().unwrap(),
            IntSize::new(8, 2)
        );
        assert_eq!(runtime.frames_submitted(renderer.overlay().handle()), 3);
    }

    #[test]
    fn test_size_beyond_i32_is_an_error() {
        let runtime = MockRuntime::new();
        let mut renderer = new_renderer(&runtime, IntSize::new(4, 4));
        renderer.render().unwrap();

        renderer.resize(IntSize::new(u32::MAX, 1));
        let Err(VrError::Render(message)) = renderer.render() else {
            panic!("expected a render error");
        };
        assert!(message.contains("too large"));
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[test]
    fn test_empty_size_is_an_error() {
        let runtime = MockRuntime::new();
        let mut renderer = new_renderer(&runtime, IntSize::new(0, 10));
        assert!(matches!(renderer.render(), Err(VrError::Render(_))));
        assert_eq!(renderer.frames_rendered(), 0);
    }
}
