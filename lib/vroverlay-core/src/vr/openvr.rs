use crate::vr::{
    ApplicationType, Color, ColorSpace, ControllerRole, HmdMatrix34, IntSize, OverlayCompositor,
    OverlayError, OverlayHandle, OverlayResult, Texture, TextureBounds, TextureType,
    TrackedDeviceIndex, TrackedDeviceProperty, TrackingOrigin, VrRuntime, VrSystem,
    INVALID_DEVICE_INDEX, OVERLAY_MAX_KEY_LENGTH, OVERLAY_MAX_NAME_LENGTH,
};
use log::{debug, warn};
use openvr_sys as sys;
use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Longest string property read back from a tracked device.
const PROPERTY_BUFFER_LENGTH: usize = 256;
const RUNTIME_PATH_BUFFER_LENGTH: usize = 1024;

/// Function tables of an initialised runtime.
#[derive(Clone, Copy)]
struct Interfaces {
    system: *const sys::VR_IVRSystem_FnTable,
    overlay: *const sys::VR_IVROverlay_FnTable,
}

/// # Safety
/// The tables are immutable and owned by the runtime, whose C API may be called from any thread.
/// They are only dereferenced while the read lock shows the runtime is still initialised.
unsafe impl Send for Interfaces {}
unsafe impl Sync for Interfaces {}

type SharedInterfaces = Arc<RwLock<Option<Interfaces>>>;

/// The installed OpenVR runtime, reached through its C API.
pub struct OpenVrRuntime {
    interfaces: SharedInterfaces,
}

struct OpenVrSystem {
    interfaces: SharedInterfaces,
}

struct OpenVrCompositor {
    interfaces: SharedInterfaces,
}

impl OpenVrRuntime {
    pub fn new() -> Self {
        Self {
            interfaces: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for OpenVrRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn read(interfaces: &SharedInterfaces) -> Option<Interfaces> {
    *interfaces.read().unwrap_or_else(PoisonError::into_inner)
}

/// Loads `FnTable:<version>`. `version` carries its own trailing nul.
fn load_table<T>(version: &[u8]) -> Result<*const T, i32> {
    let mut name = b"FnTable:".to_vec();
    name.extend_from_slice(version);

    let mut error = sys::EVRInitError_VRInitError_None;
    let table = unsafe { sys::VR_GetGenericInterface(name.as_ptr() as *const c_char, &mut error) };
    if error != sys::EVRInitError_VRInitError_None || table as usize == 0 {
        return Err(sys::EVRInitError_VRInitError_Init_InterfaceNotFound as i32);
    }
    Ok(table as *const T)
}

fn c_string(value: &str) -> OverlayResult<CString> {
    CString::new(value).map_err(|_| OverlayError::InvalidParameter)
}

/// Reads a C string the runtime returned, treating null as empty.
fn owned_string(value: *const c_char) -> String {
    if value.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned()
}

fn buffer_string(buffer: &[u8]) -> String {
    CStr::from_bytes_until_nul(buffer)
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn check(code: sys::EVROverlayError) -> OverlayResult<()> {
    match OverlayError::from_code(code as i32) {
        None => Ok(()),
        Some(error) => Err(error),
    }
}

fn application_type(application_type: ApplicationType) -> sys::EVRApplicationType {
    match application_type {
        ApplicationType::Scene => sys::EVRApplicationType_VRApplication_Scene,
        ApplicationType::Overlay => sys::EVRApplicationType_VRApplication_Overlay,
        ApplicationType::Background => sys::EVRApplicationType_VRApplication_Background,
        ApplicationType::Utility => sys::EVRApplicationType_VRApplication_Utility,
    }
}

fn tracking_origin(origin: TrackingOrigin) -> sys::ETrackingUniverseOrigin {
    match origin {
        TrackingOrigin::Seated => sys::ETrackingUniverseOrigin_TrackingUniverseSeated,
        TrackingOrigin::Standing => sys::ETrackingUniverseOrigin_TrackingUniverseStanding,
        TrackingOrigin::RawAndUncalibrated => {
            sys::ETrackingUniverseOrigin_TrackingUniverseRawAndUncalibrated
        }
    }
}

fn to_color_space(color_space: ColorSpace) -> sys::EColorSpace {
    match color_space {
        ColorSpace::Auto => sys::EColorSpace_ColorSpace_Auto,
        ColorSpace::Gamma => sys::EColorSpace_ColorSpace_Gamma,
        ColorSpace::Linear => sys::EColorSpace_ColorSpace_Linear,
    }
}

fn from_color_space(color_space: sys::EColorSpace) -> ColorSpace {
    match color_space {
        sys::EColorSpace_ColorSpace_Gamma => ColorSpace::Gamma,
        sys::EColorSpace_ColorSpace_Linear => ColorSpace::Linear,
        _ => ColorSpace::Auto,
    }
}

fn texture_type(texture_type: TextureType) -> sys::ETextureType {
    match texture_type {
        TextureType::OpenGl => sys::ETextureType_TextureType_OpenGL,
        TextureType::Vulkan => sys::ETextureType_TextureType_Vulkan,
        TextureType::DirectX => sys::ETextureType_TextureType_DirectX,
    }
}

fn controller_role(role: ControllerRole) -> sys::ETrackedControllerRole {
    match role {
        ControllerRole::LeftHand => sys::ETrackedControllerRole_TrackedControllerRole_LeftHand,
        ControllerRole::RightHand => sys::ETrackedControllerRole_TrackedControllerRole_RightHand,
    }
}

fn device_property(property: TrackedDeviceProperty) -> sys::ETrackedDeviceProperty {
    match property {
        TrackedDeviceProperty::ModelNumber => sys::ETrackedDeviceProperty_Prop_ModelNumber_String,
        TrackedDeviceProperty::SerialNumber => {
            sys::ETrackedDeviceProperty_Prop_SerialNumber_String
        }
        TrackedDeviceProperty::ManufacturerName => {
            sys::ETrackedDeviceProperty_Prop_ManufacturerName_String
        }
        TrackedDeviceProperty::TrackingSystemName => {
            sys::ETrackedDeviceProperty_Prop_TrackingSystemName_String
        }
    }
}

fn hmd_matrix(transform: &HmdMatrix34) -> sys::HmdMatrix34_t {
    sys::HmdMatrix34_t { m: transform.m }
}

impl VrRuntime for OpenVrRuntime {
    fn is_runtime_installed(&self) -> bool {
        unsafe { sys::VR_IsRuntimeInstalled() }
    }

    fn runtime_path(&self) -> Option<String> {
        let mut buffer = vec![0u8; RUNTIME_PATH_BUFFER_LENGTH];
        let mut required = 0u32;
        let found = unsafe {
            sys::VR_GetRuntimePath(
                buffer.as_mut_ptr() as *mut c_char,
                buffer.len() as u32,
                &mut required,
            )
        };
        found.then(|| buffer_string(&buffer))
    }

    fn is_hmd_present(&self) -> bool {
        unsafe { sys::VR_IsHmdPresent() }
    }

    fn init_internal(&self, application_type: ApplicationType) -> Result<u32, i32> {
        let mut error = sys::EVRInitError_VRInitError_None;
        let token =
            unsafe { sys::VR_InitInternal(&mut error, self::application_type(application_type)) };
        if error != sys::EVRInitError_VRInitError_None {
            return Err(error as i32);
        }

        let loaded = load_table(sys::IVRSystem_Version).and_then(|system| {
            Ok(Interfaces {
                system,
                overlay: load_table(sys::IVROverlay_Version)?,
            })
        });
        match loaded {
            Ok(interfaces) => {
                *self
                    .interfaces
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(interfaces);
                debug!("Loaded OpenVR system and overlay interfaces");
                Ok(token)
            }
            Err(code) => {
                unsafe { sys::VR_ShutdownInternal() };
                Err(code)
            }
        }
    }

    fn init_error_as_symbol(&self, code: i32) -> String {
        owned_string(unsafe { sys::VR_GetVRInitErrorAsSymbol(code as sys::EVRInitError) })
    }

    fn init_error_as_english_description(&self, code: i32) -> String {
        owned_string(unsafe {
            sys::VR_GetVRInitErrorAsEnglishDescription(code as sys::EVRInitError)
        })
    }

    fn shutdown_internal(&self) {
        // Cleared first so no call can reach a table the runtime is tearing down.
        let mut interfaces = self
            .interfaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if interfaces.take().is_some() {
            unsafe { sys::VR_ShutdownInternal() };
        }
    }

    fn system(&self) -> Arc<dyn VrSystem> {
        Arc::new(OpenVrSystem {
            interfaces: self.interfaces.clone(),
        })
    }

    fn overlay(&self) -> Arc<dyn OverlayCompositor> {
        Arc::new(OpenVrCompositor {
            interfaces: self.interfaces.clone(),
        })
    }
}

impl OpenVrSystem {
    fn table(&self) -> Option<&sys::VR_IVRSystem_FnTable> {
        let interfaces = read(&self.interfaces)?;
        // Valid until `shutdown_internal`, which the session only calls after its last use.
        unsafe { interfaces.system.as_ref() }
    }
}

impl VrSystem for OpenVrSystem {
    fn recommended_render_target_size(&self) -> IntSize {
        let Some(get_size) = self
            .table()
            .and_then(|table| table.GetRecommendedRenderTargetSize)
        else {
            return IntSize::default();
        };

        let mut size = IntSize::default();
        unsafe { get_size(&mut size.width, &mut size.height) };
        size
    }

    fn string_tracked_device_property(
        &self,
        device: TrackedDeviceIndex,
        property: TrackedDeviceProperty,
    ) -> Result<String, i32> {
        let get_property = self
            .table()
            .and_then(|table| table.GetStringTrackedDeviceProperty)
            .ok_or(sys::ETrackedPropertyError_TrackedProp_CouldNotContactServer as i32)?;

        let mut buffer = vec![0u8; PROPERTY_BUFFER_LENGTH];
        let mut error = sys::ETrackedPropertyError_TrackedProp_Success;
        unsafe {
            get_property(
                device,
                device_property(property),
                buffer.as_mut_ptr() as *mut c_char,
                buffer.len() as u32,
                &mut error,
            )
        };
        if error != sys::ETrackedPropertyError_TrackedProp_Success {
            return Err(error as i32);
        }
        Ok(buffer_string(&buffer))
    }

    fn tracked_device_index_for_controller_role(&self, role: ControllerRole) -> TrackedDeviceIndex {
        match self
            .table()
            .and_then(|table| table.GetTrackedDeviceIndexForControllerRole)
        {
            Some(get_index) => unsafe { get_index(controller_role(role)) },
            None => INVALID_DEVICE_INDEX,
        }
    }
}

/// Resolves an entry of the overlay table, failing like the runtime does once it is shut down.
macro_rules! entry {
    ($compositor:expr, $name:ident) => {
        $compositor.table()?.$name.ok_or(OverlayError::RequestFailed)?
    };
}

impl OpenVrCompositor {
    fn table(&self) -> OverlayResult<&sys::VR_IVROverlay_FnTable> {
        let interfaces = read(&self.interfaces).ok_or(OverlayError::RequestFailed)?;
        unsafe { interfaces.overlay.as_ref() }.ok_or(OverlayError::RequestFailed)
    }

    fn read_string(
        &self,
        handle: OverlayHandle,
        capacity: usize,
        get: unsafe extern "C" fn(
            sys::VROverlayHandle_t,
            *mut c_char,
            u32,
            *mut sys::EVROverlayError,
        ) -> u32,
    ) -> OverlayResult<String> {
        let mut buffer = vec![0u8; capacity];
        let mut error = sys::EVROverlayError_VROverlayError_None;
        unsafe {
            get(
                handle,
                buffer.as_mut_ptr() as *mut c_char,
                buffer.len() as u32,
                &mut error,
            )
        };
        check(error)?;
        Ok(buffer_string(&buffer))
    }
}

impl OverlayCompositor for OpenVrCompositor {
    fn create_overlay(&self, key: &str, name: &str) -> OverlayResult<OverlayHandle> {
        let create = entry!(self, CreateOverlay);
        let key = c_string(key)?;
        let name = c_string(name)?;
        let mut handle: sys::VROverlayHandle_t = 0;
        check(unsafe {
            create(
                key.as_ptr() as *mut c_char,
                name.as_ptr() as *mut c_char,
                &mut handle,
            )
        })?;
        Ok(handle)
    }

    fn destroy_overlay(&self, handle: OverlayHandle) -> OverlayResult<()> {
        let destroy = entry!(self, DestroyOverlay);
        check(unsafe { destroy(handle) })
    }

    fn overlay_key(&self, handle: OverlayHandle) -> OverlayResult<String> {
        self.read_string(handle, OVERLAY_MAX_KEY_LENGTH, entry!(self, GetOverlayKey))
    }

    fn overlay_name(&self, handle: OverlayHandle) -> OverlayResult<String> {
        self.read_string(handle, OVERLAY_MAX_NAME_LENGTH, entry!(self, GetOverlayName))
    }

    fn set_overlay_name(&self, handle: OverlayHandle, name: &str) -> OverlayResult<()> {
        let set_name = entry!(self, SetOverlayName);
        let name = c_string(name)?;
        check(unsafe { set_name(handle, name.as_ptr() as *mut c_char) })
    }

    fn overlay_color(&self, handle: OverlayHandle) -> OverlayResult<Color> {
        let get_color = entry!(self, GetOverlayColor);
        let mut color = Color::WHITE;
        check(unsafe { get_color(handle, &mut color.red, &mut color.green, &mut color.blue) })?;
        Ok(color)
    }

    fn set_overlay_color(&self, handle: OverlayHandle, color: Color) -> OverlayResult<()> {
        let set_color = entry!(self, SetOverlayColor);
        check(unsafe { set_color(handle, color.red, color.green, color.blue) })
    }

    fn overlay_alpha(&self, handle: OverlayHandle) -> OverlayResult<f32> {
        let get_alpha = entry!(self, GetOverlayAlpha);
        let mut alpha = 0.0;
        check(unsafe { get_alpha(handle, &mut alpha) })?;
        Ok(alpha)
    }

    fn set_overlay_alpha(&self, handle: OverlayHandle, alpha: f32) -> OverlayResult<()> {
        let set_alpha = entry!(self, SetOverlayAlpha);
        check(unsafe { set_alpha(handle, alpha) })
    }

    fn overlay_width_in_meters(&self, handle: OverlayHandle) -> OverlayResult<f32> {
        let get_width = entry!(self, GetOverlayWidthInMeters);
        let mut width = 0.0;
        check(unsafe { get_width(handle, &mut width) })?;
        Ok(width)
    }

    fn set_overlay_width_in_meters(
        &self,
        handle: OverlayHandle,
        width: f32,
    ) -> OverlayResult<()> {
        let set_width = entry!(self, SetOverlayWidthInMeters);
        check(unsafe { set_width(handle, width) })
    }

    fn overlay_texture_bounds(&self, handle: OverlayHandle) -> OverlayResult<TextureBounds> {
        let get_bounds = entry!(self, GetOverlayTextureBounds);
        let mut bounds = sys::VRTextureBounds_t {
            uMin: 0.0,
            vMin: 0.0,
            uMax: 0.0,
            vMax: 0.0,
        };
        check(unsafe { get_bounds(handle, &mut bounds) })?;
        Ok(TextureBounds {
            u_min: bounds.uMin,
            v_min: bounds.vMin,
            u_max: bounds.uMax,
            v_max: bounds.vMax,
        })
    }

    fn set_overlay_texture_bounds(
        &self,
        handle: OverlayHandle,
        bounds: TextureBounds,
    ) -> OverlayResult<()> {
        let set_bounds = entry!(self, SetOverlayTextureBounds);
        let mut bounds = sys::VRTextureBounds_t {
            uMin: bounds.u_min,
            vMin: bounds.v_min,
            uMax: bounds.u_max,
            vMax: bounds.v_max,
        };
        check(unsafe { set_bounds(handle, &mut bounds) })
    }

    fn overlay_texture_color_space(&self, handle: OverlayHandle) -> OverlayResult<ColorSpace> {
        let get_color_space = entry!(self, GetOverlayTextureColorSpace);
        let mut color_space = sys::EColorSpace_ColorSpace_Auto;
        check(unsafe { get_color_space(handle, &mut color_space) })?;
        Ok(from_color_space(color_space))
    }

    fn set_overlay_texture_color_space(
        &self,
        handle: OverlayHandle,
        color_space: ColorSpace,
    ) -> OverlayResult<()> {
        let set_color_space = entry!(self, SetOverlayTextureColorSpace);
        check(unsafe { set_color_space(handle, to_color_space(color_space)) })
    }

    fn overlay_texture_size(&self, handle: OverlayHandle) -> OverlayResult<IntSize> {
        let get_size = entry!(self, GetOverlayTextureSize);
        let mut size = IntSize::default();
        check(unsafe { get_size(handle, &mut size.width, &mut size.height) })?;
        Ok(size)
    }

    fn set_overlay_texture(&self, handle: OverlayHandle, texture: &Texture) -> OverlayResult<()> {
        let set_texture = entry!(self, SetOverlayTexture);
        let mut native = sys::Texture_t {
            handle: texture.handle as usize as *mut c_void,
            eType: texture_type(texture.texture_type),
            eColorSpace: to_color_space(texture.color_space),
        };
        check(unsafe { set_texture(handle, &mut native) })
    }

    fn set_overlay_raw(
        &self,
        handle: OverlayHandle,
        pixels: &[u8],
        size: IntSize,
        bytes_per_pixel: u32,
    ) -> OverlayResult<()> {
        if pixels.len() != size.area() * bytes_per_pixel as usize {
            return Err(OverlayError::InvalidParameter);
        }
        let set_raw = entry!(self, SetOverlayRaw);
        // The runtime copies the buffer before returning and never writes through it.
        check(unsafe {
            set_raw(
                handle,
                pixels.as_ptr() as *mut c_void,
                size.width,
                size.height,
                bytes_per_pixel,
            )
        })
    }

    fn set_overlay_from_file(&self, handle: OverlayHandle, path: &Path) -> OverlayResult<()> {
        let set_from_file = entry!(self, SetOverlayFromFile);
        let path = path.to_str().ok_or(OverlayError::UnableToLoadFile)?;
        let path = c_string(path)?;
        check(unsafe { set_from_file(handle, path.as_ptr() as *mut c_char) })
    }

    fn clear_overlay_texture(&self, handle: OverlayHandle) -> OverlayResult<()> {
        let clear = entry!(self, ClearOverlayTexture);
        check(unsafe { clear(handle) })
    }

    fn show_overlay(&self, handle: OverlayHandle) -> OverlayResult<()> {
        let show = entry!(self, ShowOverlay);
        check(unsafe { show(handle) })
    }

    fn hide_overlay(&self, handle: OverlayHandle) -> OverlayResult<()> {
        let hide = entry!(self, HideOverlay);
        check(unsafe { hide(handle) })
    }

    fn is_overlay_visible(&self, handle: OverlayHandle) -> OverlayResult<bool> {
        let is_visible = entry!(self, IsOverlayVisible);
        Ok(unsafe { is_visible(handle) })
    }

    fn set_overlay_transform_absolute(
        &self,
        handle: OverlayHandle,
        origin: TrackingOrigin,
        transform: &HmdMatrix34,
    ) -> OverlayResult<()> {
        let set_transform = entry!(self, SetOverlayTransformAbsolute);
        let mut matrix = hmd_matrix(transform);
        check(unsafe { set_transform(handle, tracking_origin(origin), &mut matrix) })
    }

    fn set_overlay_transform_tracked_device_relative(
        &self,
        handle: OverlayHandle,
        device: TrackedDeviceIndex,
        transform: &HmdMatrix34,
    ) -> OverlayResult<()> {
        let set_transform = entry!(self, SetOverlayTransformTrackedDeviceRelative);
        let mut matrix = hmd_matrix(transform);
        check(unsafe { set_transform(handle, device, &mut matrix) })
    }
}

impl Drop for OpenVrRuntime {
    fn drop(&mut self) {
        if read(&self.interfaces).is_some() {
            warn!("OpenVR runtime dropped while initialised, shutting it down");
            self.shutdown_internal();
        }
    }
}
