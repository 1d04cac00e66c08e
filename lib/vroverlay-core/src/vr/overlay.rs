use crate::vr::{
    Color, ColorSpace, HmdMatrix34, IntSize, OverlayCompositor, OverlayHandle, OverlayResult,
    Texture, TextureBounds, TrackedDeviceIndex, TrackingOrigin, VrError, VrResult,
};
use log::warn;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One compositor overlay. Cloning shares the same native overlay.
#[derive(Clone)]
pub struct Overlay {
    handle: OverlayHandle,
    compositor: Arc<dyn OverlayCompositor>,
}

impl Overlay {
    pub fn create(
        compositor: Arc<dyn OverlayCompositor>,
        key: &str,
        name: &str,
    ) -> VrResult<Self> {
        let handle = check(
            compositor.create_overlay(key, name),
            "VROverlay.CreateOverlay",
        )?;
        Ok(Self { handle, compositor })
    }

    pub fn handle(&self) -> OverlayHandle {
        self.handle
    }

    pub fn key(&self) -> VrResult<String> {
        check(
            self.compositor.overlay_key(self.handle),
            "VROverlay.GetOverlayKey",
        )
    }

    pub fn name(&self) -> VrResult<String> {
        check(
            self.compositor.overlay_name(self.handle),
            "VROverlay.GetOverlayName",
        )
    }

    pub fn set_name(&self, name: &str) -> VrResult<()> {
        check(
            self.compositor.set_overlay_name(self.handle, name),
            "VROverlay.SetOverlayName",
        )
    }

    pub fn color(&self) -> VrResult<Color> {
        check(
            self.compositor.overlay_color(self.handle),
            "VROverlay.GetOverlayColor",
        )
    }

    pub fn set_color(&self, color: Color) -> VrResult<()> {
        check(
            self.compositor.set_overlay_color(self.handle, color),
            "VROverlay.SetOverlayColor",
        )
    }

    pub fn alpha(&self) -> VrResult<f32> {
        check(
            self.compositor.overlay_alpha(self.handle),
            "VROverlay.GetOverlayAlpha",
        )
    }

    pub fn set_alpha(&self, alpha: f32) -> VrResult<()> {
        check(
            self.compositor.set_overlay_alpha(self.handle, alpha),
            "VROverlay.SetOverlayAlpha",
        )
    }

    pub fn width_in_meters(&self) -> VrResult<f32> {
        check(
            self.compositor.overlay_width_in_meters(self.handle),
            "VROverlay.GetOverlayWidthInMeters",
        )
    }

    pub fn set_width_in_meters(&self, width: f32) -> VrResult<()> {
        check(
            self.compositor.set_overlay_width_in_meters(self.handle, width),
            "VROverlay.SetOverlayWidthInMeters",
        )
    }

    pub fn texture_bounds(&self) -> VrResult<TextureBounds> {
        check(
            self.compositor.overlay_texture_bounds(self.handle),
            "VROverlay.GetOverlayTextureBounds",
        )
    }

    pub fn set_texture_bounds(&self, bounds: TextureBounds) -> VrResult<()> {
        check(
            self.compositor.set_overlay_texture_bounds(self.handle, bounds),
            "VROverlay.SetOverlayTextureBounds",
        )
    }

    pub fn texture_color_space(&self) -> VrResult<ColorSpace> {
        check(
            self.compositor.overlay_texture_color_space(self.handle),
            "VROverlay.GetOverlayTextureColorSpace",
        )
    }

    pub fn set_texture_color_space(&self, color_space: ColorSpace) -> VrResult<()> {
        check(
            self.compositor
                .set_overlay_texture_color_space(self.handle, color_space),
            "VROverlay.SetOverlayTextureColorSpace",
        )
    }

    pub fn texture_size(&self) -> VrResult<IntSize> {
        check(
            self.compositor.overlay_texture_size(self.handle),
            "VROverlay.GetOverlayTextureSize",
        )
    }

    pub fn set_texture(&self, texture: &Texture) -> VrResult<()> {
        check(
            self.compositor.set_overlay_texture(self.handle, texture),
            "VROverlay.SetOverlayTexture",
        )
    }

    pub fn set_raw(&self, pixels: &[u8], size: IntSize, bytes_per_pixel: u32) -> VrResult<()> {
        check(
            self.compositor
                .set_overlay_raw(self.handle, pixels, size, bytes_per_pixel),
            "VROverlay.SetOverlayRaw",
        )
    }

    pub fn set_from_file(&self, path: &Path) -> VrResult<()> {
        // The runtime resolves paths itself, so hand it an absolute one.
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        check(
            self.compositor.set_overlay_from_file(self.handle, &path),
            "VROverlay.SetOverlayFromFile",
        )
    }

    pub fn clear_texture(&self) -> VrResult<()> {
        check(
            self.compositor.clear_overlay_texture(self.handle),
            "VROverlay.ClearOverlayTexture",
        )
    }

    pub fn show(&self) -> VrResult<()> {
        check(
            self.compositor.show_overlay(self.handle),
            "VROverlay.ShowOverlay",
        )
    }

    pub fn hide(&self) -> VrResult<()> {
        check(
            self.compositor.hide_overlay(self.handle),
            "VROverlay.HideOverlay",
        )
    }

    pub fn set_visible(&self, visible: bool) -> VrResult<()> {
        if visible {
            self.show()
        } else {
            self.hide()
        }
    }

    pub fn is_visible(&self) -> VrResult<bool> {
        check(
            self.compositor.is_overlay_visible(self.handle),
            "VROverlay.IsOverlayVisible",
        )
    }

    pub fn destroy(&self) -> VrResult<()> {
        check(
            self.compositor.destroy_overlay(self.handle),
            "VROverlay.DestroyOverlay",
        )
    }

    pub fn set_transform_absolute(
        &self,
        origin: TrackingOrigin,
        transform: &HmdMatrix34,
    ) -> VrResult<()> {
        check(
            self.compositor
                .set_overlay_transform_absolute(self.handle, origin, transform),
            "VROverlay.SetOverlayTransformAbsolute",
        )
    }

    pub fn set_transform_tracked_device_relative(
        &self,
        device: TrackedDeviceIndex,
        transform: &HmdMatrix34,
    ) -> VrResult<()> {
        check(
            self.compositor
                .set_overlay_transform_tracked_device_relative(self.handle, device, transform),
            "VROverlay.SetOverlayTransformTrackedDeviceRelative",
        )
    }
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("handle", &self.handle)
            .finish()
    }
}

fn check<T>(result: OverlayResult<T>, function: &'static str) -> VrResult<T> {
    result.map_err(|error| {
        warn!(
            "Got error: {} ({}) from function: {}",
            error.code(),
            error.name(),
            function
        );
        VrError::Overlay { function, error }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::mock::MockRuntime;
    use crate::vr::{OverlayError, VrRuntime};

    fn new_overlay(runtime: &MockRuntime, key: &str) -> Overlay {
        runtime.init_internal(crate::vr::ApplicationType::Overlay).unwrap();
        Overlay::create(runtime.overlay(), key, "Test").unwrap()
    }

    #[test]
    fn test_properties_reach_the_compositor() {
        let runtime = MockRuntime::new();
        let overlay = new_overlay(&runtime, "test.properties");

        overlay.set_width_in_meters(3.0).unwrap();
        overlay.set_alpha(0.5).unwrap();
        overlay.set_name("Renamed").unwrap();
        overlay.set_color(Color::new(1.0, 0.0, 0.0)).unwrap();

        assert_eq!(overlay.width_in_meters().unwrap(), 3.0);
        assert_eq!(overlay.alpha().unwrap(), 0.5);
        assert_eq!(overlay.name().unwrap(), "Renamed");
        assert_eq!(overlay.key().unwrap(), "test.properties");
        assert_eq!(overlay.color().unwrap(), Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let runtime = MockRuntime::new();
        let _first = new_overlay(&runtime, "test.duplicate");
        let second = Overlay::create(runtime.overlay(), "test.duplicate", "Other");
        assert!(matches!(
            second,
            Err(VrError::Overlay {
                function: "VROverlay.CreateOverlay",
                error: OverlayError::KeyInUse,
            })
        ));
    }

    #[test]
    fn test_calls_after_destroy_fail() {
        let runtime = MockRuntime::new();
        let overlay = new_overlay(&runtime, "test.destroyed");
        overlay.destroy().unwrap();
        assert!(matches!(
            overlay.show(),
            Err(VrError::Overlay {
                error: OverlayError::UnknownOverlay,
                ..
            })
        ));
    }

    #[test]
    fn test_visibility_toggles() {
        let runtime = MockRuntime::new();
        let overlay = new_overlay(&runtime, "test.visibility");
        assert!(!overlay.is_visible().unwrap());
        overlay.set_visible(true).unwrap();
        assert!(overlay.is_visible().unwrap());
        overlay.set_visible(false).unwrap();
        assert!(!overlay.is_visible().unwrap());
    }

    #[test]
    fn test_raw_upload_sets_texture_size() {
        let runtime = MockRuntime::new();
        let overlay = new_overlay(&runtime, "test.raw");
        let size = IntSize::new(4, 2);
        overlay.set_raw(&vec![0; size.area() * 4], size, 4).unwrap();
        assert_eq!(overlay.texture_size().unwrap(), size);

        assert!(overlay.set_raw(&[0; 3], size, 4).is_err());
        overlay.clear_texture().unwrap();
        assert_eq!(overlay.texture_size().unwrap(), IntSize::default());
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let runtime = MockRuntime::new();
        let overlay = new_overlay(&runtime, "test.file");
        assert!(matches!(
            overlay.set_from_file(Path::new("does/not/exist.png")),
            Err(VrError::Overlay {
                error: OverlayError::UnableToLoadFile,
                ..
            })
        ));
    }
}
