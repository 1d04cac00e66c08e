use crate::vr::{
    ApplicationType, Color, ColorSpace, ControllerRole, HmdMatrix34, IntSize, OverlayCompositor,
    OverlayError, OverlayHandle, OverlayResult, Texture, TextureBounds, TrackedDeviceIndex,
    TrackedDeviceProperty, TrackingOrigin, VrRuntime, VrSystem, HMD_DEVICE_INDEX,
    INVALID_DEVICE_INDEX, OVERLAY_MAX_KEY_LENGTH, OVERLAY_MAX_NAME_LENGTH,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const INIT_ERROR_HMD_NOT_FOUND: i32 = 108;
const TRACKED_PROP_INVALID_DEVICE: i32 = 5;
const TRACKED_PROP_COULD_NOT_CONTACT_SERVER: i32 = 6;

/// In-process stand-in for a VR runtime, so overlays can be driven without a headset.
#[derive(Clone)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
    hmd_present: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockTexture {
    Native(Texture),
    Raw { size: IntSize, pixels: Vec<u8> },
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockTransform {
    Absolute {
        origin: TrackingOrigin,
        transform: HmdMatrix34,
    },
    TrackedDeviceRelative {
        device: TrackedDeviceIndex,
        transform: HmdMatrix34,
    },
}

#[derive(Debug, Clone)]
pub struct MockOverlay {
    pub key: String,
    pub name: String,
    pub color: Color,
    pub alpha: f32,
    pub width_in_meters: f32,
    pub texture_bounds: TextureBounds,
    pub texture_color_space: ColorSpace,
    pub texture: Option<MockTexture>,
    pub visible: bool,
    pub transform: Option<MockTransform>,
    pub frames_submitted: u64,
}

impl MockOverlay {
    fn new(key: &str, name: &str) -> Self {
        Self {
            key: key.to_owned(),
            name: name.to_owned(),
            color: Color::WHITE,
            alpha: 1.0,
            width_in_meters: 1.0,
            texture_bounds: TextureBounds::default(),
            texture_color_space: ColorSpace::Auto,
            texture: None,
            visible: false,
            transform: None,
            frames_submitted: 0,
        }
    }

    fn set_texture(&mut self, texture: MockTexture) {
        self.texture = Some(texture);
        self.frames_submitted += 1;
    }
}

struct MockState {
    initialized: bool,
    shutdown_count: usize,
    next_handle: OverlayHandle,
    overlays: HashMap<OverlayHandle, MockOverlay>,
    controllers: HashMap<ControllerRole, TrackedDeviceIndex>,
}

struct MockSystem {
    state: Arc<Mutex<MockState>>,
}

struct MockCompositor {
    state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                initialized: false,
                shutdown_count: 0,
                next_handle: 1,
                overlays: HashMap::new(),
                controllers: HashMap::new(),
            })),
            hmd_present: true,
        }
    }

    /// A runtime whose initialisation fails as if no headset were connected.
    pub fn without_hmd() -> Self {
        Self {
            hmd_present: false,
            ..Self::new()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn shutdown_count(&self) -> usize {
        self.lock().shutdown_count
    }

    pub fn connect_controller(&self, role: ControllerRole, device: TrackedDeviceIndex) {
        self.lock().controllers.insert(role, device);
    }

    pub fn overlay_count(&self) -> usize {
        self.lock().overlays.len()
    }

    pub fn overlay_snapshot(&self, handle: OverlayHandle) -> Option<MockOverlay> {
        self.lock().overlays.get(&handle).cloned()
    }

    pub fn frames_submitted(&self, handle: OverlayHandle) -> u64 {
        self.lock()
            .overlays
            .get(&handle)
            .map_or(0, |overlay| overlay.frames_submitted)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock_state(&self.state)
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_state(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VrRuntime for MockRuntime {
    fn is_runtime_installed(&self) -> bool {
        true
    }

    fn runtime_path(&self) -> Option<String> {
        Some("<mock>".to_owned())
    }

    fn is_hmd_present(&self) -> bool {
        self.hmd_present
    }

    fn init_internal(&self, _application_type: ApplicationType) -> Result<u32, i32> {
        if !self.hmd_present {
            return Err(INIT_ERROR_HMD_NOT_FOUND);
        }
        self.lock().initialized = true;
        Ok(1)
    }

    fn init_error_as_symbol(&self, code: i32) -> String {
        match code {
            INIT_ERROR_HMD_NOT_FOUND => "VRInitError_Init_HmdNotFound".to_owned(),
            _ => "VRInitError_Unknown".to_owned(),
        }
    }

    fn init_error_as_english_description(&self, code: i32) -> String {
        match code {
            INIT_ERROR_HMD_NOT_FOUND => format!("Hmd Not Found ({code})"),
            _ => format!("Unknown error ({code})"),
        }
    }

    fn shutdown_internal(&self) {
        let mut state = self.lock();
        state.initialized = false;
        state.shutdown_count += 1;
        state.overlays.clear();
    }

    fn system(&self) -> Arc<dyn VrSystem> {
        Arc::new(MockSystem {
            state: self.state.clone(),
        })
    }

    fn overlay(&self) -> Arc<dyn OverlayCompositor> {
        Arc::new(MockCompositor {
            state: self.state.clone(),
        })
    }
}

impl VrSystem for MockSystem {
    fn recommended_render_target_size(&self) -> IntSize {
        IntSize::new(2016, 2240)
    }

    fn string_tracked_device_property(
        &self,
        device: TrackedDeviceIndex,
        property: TrackedDeviceProperty,
    ) -> Result<String, i32> {
        if !lock_state(&self.state).initialized {
            return Err(TRACKED_PROP_COULD_NOT_CONTACT_SERVER);
        }
        if device != HMD_DEVICE_INDEX {
            return Err(TRACKED_PROP_INVALID_DEVICE);
        }

        let value = match property {
            TrackedDeviceProperty::ModelNumber => "Mock HMD",
            TrackedDeviceProperty::SerialNumber => "MOCK-0001",
            TrackedDeviceProperty::ManufacturerName => "vroverlay",
            TrackedDeviceProperty::TrackingSystemName => "mock",
        };
        Ok(value.to_owned())
    }

    fn tracked_device_index_for_controller_role(&self, role: ControllerRole) -> TrackedDeviceIndex {
        lock_state(&self.state)
            .controllers
            .get(&role)
            .copied()
            .unwrap_or(INVALID_DEVICE_INDEX)
    }
}

impl MockCompositor {
    fn active(&self) -> OverlayResult<MutexGuard<'_, MockState>> {
        let state = lock_state(&self.state);
        if !state.initialized {
            return Err(OverlayError::RequestFailed);
        }
        Ok(state)
    }

    fn with_overlay<F, R>(&self, handle: OverlayHandle, f: F) -> OverlayResult<R>
    where
        F: FnOnce(&mut MockOverlay) -> OverlayResult<R>,
    {
        let mut state = self.active()?;
        let overlay = state
            .overlays
            .get_mut(&handle)
            .ok_or(OverlayError::UnknownOverlay)?;
        f(overlay)
    }
}

fn unit_range(value: f32) -> OverlayResult<f32> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(OverlayError::InvalidParameter)
    }
}

impl OverlayCompositor for MockCompositor {
    fn create_overlay(&self, key: &str, name: &str) -> OverlayResult<OverlayHandle> {
        let mut state = self.active()?;
        if key.len() > OVERLAY_MAX_KEY_LENGTH {
            return Err(OverlayError::KeyTooLong);
        }
        if name.len() > OVERLAY_MAX_NAME_LENGTH {
            return Err(OverlayError::NameTooLong);
        }
        if state.overlays.values().any(|overlay| overlay.key == key) {
            return Err(OverlayError::KeyInUse);
        }

        let handle = state.next_handle;
        state.next_handle += 1;
        state.overlays.insert(handle, MockOverlay::new(key, name));
        Ok(handle)
    }

    fn destroy_overlay(&self, handle: OverlayHandle) -> OverlayResult<()> {
        self.active()?
            .overlays
            .remove(&handle)
            .map(|_| ())
            .ok_or(OverlayError::UnknownOverlay)
    }

    fn overlay_key(&self, handle: OverlayHandle) -> OverlayResult<String> {
        self.with_overlay(handle, |overlay| Ok(overlay.key.clone()))
    }

    fn overlay_name(&self, handle: OverlayHandle) -> OverlayResult<String> {
        self.with_overlay(handle, |overlay| Ok(overlay.name.clone()))
    }

    fn set_overlay_name(&self, handle: OverlayHandle, name: &str) -> OverlayResult<()> {
        if name.len() > OVERLAY_MAX_NAME_LENGTH {
            return Err(OverlayError::NameTooLong);
        }
        self.with_overlay(handle, |overlay| {
            overlay.name = name.to_owned();
            Ok(())
        })
    }

    fn overlay_color(&self, handle: OverlayHandle) -> OverlayResult<Color> {
        self.with_overlay(handle, |overlay| Ok(overlay.color))
    }

    fn set_overlay_color(&self, handle: OverlayHandle, color: Color) -> OverlayResult<()> {
        let color = Color::new(
            unit_range(color.red)?,
            unit_range(color.green)?,
            unit_range(color.blue)?,
        );
        self.with_overlay(handle, |overlay| {
            overlay.color = color;
            Ok(())
        })
    }

    fn overlay_alpha(&self, handle: OverlayHandle) -> OverlayResult<f32> {
        self.with_overlay(handle, |overlay| Ok(overlay.alpha))
    }

    fn set_overlay_alpha(&self, handle: OverlayHandle, alpha: f32) -> OverlayResult<()> {
        let alpha = unit_range(alpha)?;
        self.with_overlay(handle, |overlay| {
            overlay.alpha = alpha;
            Ok(())
        })
    }

    fn overlay_width_in_meters(&self, handle: OverlayHandle) -> OverlayResult<f32> {
        self.with_overlay(handle, |overlay| Ok(overlay.width_in_meters))
    }

    fn set_overlay_width_in_meters(
        &self,
        handle: OverlayHandle,
        width: f32,
    ) -> OverlayResult<()> {
        if !(width > 0.0) {
            return Err(OverlayError::InvalidParameter);
        }
        self.with_overlay(handle, |overlay| {
            overlay.width_in_meters = width;
            Ok(())
        })
    }

    fn overlay_texture_bounds(&self, handle: OverlayHandle) -> OverlayResult<TextureBounds> {
        self.with_overlay(handle, |overlay| Ok(overlay.texture_bounds))
    }

    fn set_overlay_texture_bounds(
        &self,
        handle: OverlayHandle,
        bounds: TextureBounds,
    ) -> OverlayResult<()> {
        self.with_overlay(handle, |overlay| {
            overlay.texture_bounds = bounds;
            Ok(())
        })
    }

    fn overlay_texture_color_space(&self, handle: OverlayHandle) -> OverlayResult<ColorSpace> {
        self.with_overlay(handle, |overlay| Ok(overlay.texture_color_space))
    }

    fn set_overlay_texture_color_space(
        &self,
        handle: OverlayHandle,
        color_space: ColorSpace,
    ) -> OverlayResult<()> {
        self.with_overlay(handle, |overlay| {
            overlay.texture_color_space = color_space;
            Ok(())
        })
    }

    /// Only raw uploads carry a size the mock knows about; other textures report zero.
    fn overlay_texture_size(&self, handle: OverlayHandle) -> OverlayResult<IntSize> {
        self.with_overlay(handle, |overlay| match &overlay.texture {
            Some(MockTexture::Raw { size, .. }) => Ok(*size),
            _ => Ok(IntSize::default()),
        })
    }

    fn set_overlay_texture(&self, handle: OverlayHandle, texture: &Texture) -> OverlayResult<()> {
        if texture.handle == 0 {
            return Err(OverlayError::InvalidTexture);
        }
        self.with_overlay(handle, |overlay| {
            overlay.set_texture(MockTexture::Native(*texture));
            Ok(())
        })
    }

    fn set_overlay_raw(
        &self,
        handle: OverlayHandle,
        pixels: &[u8],
        size: IntSize,
        bytes_per_pixel: u32,
    ) -> OverlayResult<()> {
        if size.is_empty()
            || !(1..=4).contains(&bytes_per_pixel)
            || pixels.len() != size.area() * bytes_per_pixel as usize
        {
            return Err(OverlayError::InvalidParameter);
        }
        self.with_overlay(handle, |overlay| {
            overlay.set_texture(MockTexture::Raw {
                size,
                pixels: pixels.to_vec(),
            });
            Ok(())
        })
    }

    fn set_overlay_from_file(&self, handle: OverlayHandle, path: &Path) -> OverlayResult<()> {
        if !path.is_file() {
            return Err(OverlayError::UnableToLoadFile);
        }
        self.with_overlay(handle, |overlay| {
            overlay.set_texture(MockTexture::File(path.to_path_buf()));
            Ok(())
        })
    }

    fn clear_overlay_texture(&self, handle: OverlayHandle) -> OverlayResult<()> {
        self.with_overlay(handle, |overlay| {
            overlay.texture = None;
            Ok(())
        })
    }

    fn show_overlay(&self, handle: OverlayHandle) -> OverlayResult<()> {
        self.with_overlay(handle, |overlay| {
            overlay.visible = true;
            Ok(())
        })
    }

    fn hide_overlay(&self, handle: OverlayHandle) -> OverlayResult<()> {
        self.with_overlay(handle, |overlay| {
            overlay.visible = false;
            Ok(())
        })
    }

    fn is_overlay_visible(&self, handle: OverlayHandle) -> OverlayResult<bool> {
        self.with_overlay(handle, |overlay| Ok(overlay.visible))
    }

    fn set_overlay_transform_absolute(
        &self,
        handle: OverlayHandle,
        origin: TrackingOrigin,
        transform: &HmdMatrix34,
    ) -> OverlayResult<()> {
        self.with_overlay(handle, |overlay| {
            overlay.transform = Some(MockTransform::Absolute {
                origin,
                transform: *transform,
            });
            Ok(())
        })
    }

    fn set_overlay_transform_tracked_device_relative(
        &self,
        handle: OverlayHandle,
        device: TrackedDeviceIndex,
        transform: &HmdMatrix34,
    ) -> OverlayResult<()> {
        if device == INVALID_DEVICE_INDEX {
            return Err(OverlayError::InvalidTrackedDevice);
        }
        self.with_overlay(handle, |overlay| {
            overlay.transform = Some(MockTransform::TrackedDeviceRelative {
                device,
                transform: *transform,
            });
            Ok(())
        })
    }
}
