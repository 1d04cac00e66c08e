use crate::vr::{
    ApplicationType, Color, ColorSpace, ControllerRole, HmdMatrix34, IntSize, OverlayError,
    OverlayHandle, Texture, TextureBounds, TrackedDeviceIndex, TrackedDeviceProperty,
    TrackingOrigin,
};
use std::path::Path;
use std::sync::Arc;

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Entry points of the VR runtime itself.
pub trait VrRuntime: Send + Sync {
    fn is_runtime_installed(&self) -> bool;

    fn runtime_path(&self) -> Option<String>;

    fn is_hmd_present(&self) -> bool;

    /// Performs the runtime handshake. Returns the session token or a raw init error code.
    fn init_internal(&self, application_type: ApplicationType) -> Result<u32, i32>;

    fn init_error_as_symbol(&self, code: i32) -> String;

    fn init_error_as_english_description(&self, code: i32) -> String;

    fn shutdown_internal(&self);

    fn system(&self) -> Arc<dyn VrSystem>;

    fn overlay(&self) -> Arc<dyn OverlayCompositor>;
}

pub trait VrSystem: Send + Sync {
    fn recommended_render_target_size(&self) -> IntSize;

    /// Returns the property value or the raw tracked property error code.
    fn string_tracked_device_property(
        &self,
        device: TrackedDeviceIndex,
        property: TrackedDeviceProperty,
    ) -> Result<String, i32>;

    /// Returns [`INVALID_DEVICE_INDEX`](crate::vr::INVALID_DEVICE_INDEX) when no device has the
    /// role.
    fn tracked_device_index_for_controller_role(&self, role: ControllerRole) -> TrackedDeviceIndex;
}

/// The compositor's overlay API. Keys must be unique, names need not be.
pub trait OverlayCompositor: Send + Sync {
    fn create_overlay(&self, key: &str, name: &str) -> OverlayResult<OverlayHandle>;
    fn destroy_overlay(&self, handle: OverlayHandle) -> OverlayResult<()>;

    fn overlay_key(&self, handle: OverlayHandle) -> OverlayResult<String>;
    fn overlay_name(&self, handle: OverlayHandle) -> OverlayResult<String>;
    fn set_overlay_name(&self, handle: OverlayHandle, name: &str) -> OverlayResult<()>;

    fn overlay_color(&self, handle: OverlayHandle) -> OverlayResult<Color>;
    fn set_overlay_color(&self, handle: OverlayHandle, color: Color) -> OverlayResult<()>;
    fn overlay_alpha(&self, handle: OverlayHandle) -> OverlayResult<f32>;
    fn set_overlay_alpha(&self, handle: OverlayHandle, alpha: f32) -> OverlayResult<()>;
    fn overlay_width_in_meters(&self, handle: OverlayHandle) -> OverlayResult<f32>;
    fn set_overlay_width_in_meters(&self, handle: OverlayHandle, width: f32)
        -> OverlayResult<()>;

    fn overlay_texture_bounds(&self, handle: OverlayHandle) -> OverlayResult<TextureBounds>;
    fn set_overlay_texture_bounds(
        &self,
        handle: OverlayHandle,
        bounds: TextureBounds,
    ) -> OverlayResult<()>;
    fn overlay_texture_color_space(&self, handle: OverlayHandle) -> OverlayResult<ColorSpace>;
    fn set_overlay_texture_color_space(
        &self,
        handle: OverlayHandle,
        color_space: ColorSpace,
    ) -> OverlayResult<()>;
    fn overlay_texture_size(&self, handle: OverlayHandle) -> OverlayResult<IntSize>;

    fn set_overlay_texture(&self, handle: OverlayHandle, texture: &Texture) -> OverlayResult<()>;
    /// Uploads CPU pixels. `pixels.len()` must equal `width * height * bytes_per_pixel`.
    fn set_overlay_raw(
        &self,
        handle: OverlayHandle,
        pixels: &[u8],
        size: IntSize,
        bytes_per_pixel: u32,
    ) -> OverlayResult<()>;
    fn set_overlay_from_file(&self, handle: OverlayHandle, path: &Path) -> OverlayResult<()>;
    fn clear_overlay_texture(&self, handle: OverlayHandle) -> OverlayResult<()>;

    fn show_overlay(&self, handle: OverlayHandle) -> OverlayResult<()>;
    fn hide_overlay(&self, handle: OverlayHandle) -> OverlayResult<()>;
    fn is_overlay_visible(&self, handle: OverlayHandle) -> OverlayResult<bool>;

    fn set_overlay_transform_absolute(
        &self,
        handle: OverlayHandle,
        origin: TrackingOrigin,
        transform: &HmdMatrix34,
    ) -> OverlayResult<()>;
    fn set_overlay_transform_tracked_device_relative(
        &self,
        handle: OverlayHandle,
        device: TrackedDeviceIndex,
        transform: &HmdMatrix34,
    ) -> OverlayResult<()>;
}
