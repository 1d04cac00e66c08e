use crate::vr::{
    ApplicationType, ControllerRole, HmdMatrix34, Overlay, TrackedDeviceProperty, VrError,
    VrResult, VrRuntime, VrSystem, HMD_DEVICE_INDEX, INVALID_DEVICE_INDEX,
};
use log::{debug, info};
use std::sync::Arc;

/// An initialised connection to the VR runtime. Created once by the embedding application and
/// shut down explicitly or on drop.
pub struct VrSession {
    runtime: Arc<dyn VrRuntime>,
    token: Option<u32>,
}

impl VrSession {
    pub fn initialize(runtime: Arc<dyn VrRuntime>) -> VrResult<Self> {
        pre_init_diagnostics(runtime.as_ref());

        let token = runtime
            .init_internal(ApplicationType::Overlay)
            .map_err(|code| VrError::Init {
                code,
                symbol: runtime.init_error_as_symbol(code),
                description: runtime.init_error_as_english_description(code),
            })?;
        info!("VR runtime initialised");

        post_init_diagnostics(runtime.system().as_ref());

        Ok(Self {
            runtime,
            token: Some(token),
        })
    }

    pub fn token(&self) -> Option<u32> {
        self.token
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    pub fn system(&self) -> VrResult<Arc<dyn VrSystem>> {
        self.ensure_active()?;
        Ok(self.runtime.system())
    }

    pub fn create_overlay(&self, key: &str, name: &str) -> VrResult<Overlay> {
        self.ensure_active()?;
        Overlay::create(self.runtime.overlay(), key, name)
    }

    /// Pins `overlay` to the controller holding `role`.
    pub fn attach_to_controller(&self, overlay: &Overlay, role: ControllerRole) -> VrResult<()> {
        let device = self
            .system()?
            .tracked_device_index_for_controller_role(role);
        if device == INVALID_DEVICE_INDEX {
            return Err(VrError::NoController(role));
        }

        overlay.set_transform_tracked_device_relative(device, &HmdMatrix34::identity())
    }

    pub fn shutdown(&mut self) {
        if self.token.take().is_some() {
            self.runtime.shutdown_internal();
            info!("VR runtime shut down");
        }
    }

    fn ensure_active(&self) -> VrResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(VrError::SessionClosed)
        }
    }
}

impl Drop for VrSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn pre_init_diagnostics(runtime: &dyn VrRuntime) {
    debug!("VR runtime installed: {}", runtime.is_runtime_installed());
    debug!("VR runtime path: {:?}", runtime.runtime_path());
    debug!("HMD present: {}", runtime.is_hmd_present());
}

fn post_init_diagnostics(system: &dyn VrSystem) {
    let property = |property| {
        system
            .string_tracked_device_property(HMD_DEVICE_INDEX, property)
            .unwrap_or_else(|code| format!("<error {code}>"))
    };
    debug!("Model Number : {}", property(TrackedDeviceProperty::ModelNumber));
    debug!("Serial Number: {}", property(TrackedDeviceProperty::SerialNumber));
    debug!(
        "Recommended size: {:?}",
        system.recommended_render_target_size()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::mock::MockRuntime;

    #[test]
    fn test_initialize_and_shutdown() {
        let runtime = Arc::new(MockRuntime::new());
        let mut session = VrSession::initialize(runtime.clone()).unwrap();
        assert!(session.is_active());
        assert!(runtime.is_initialized());

        session.shutdown();
        assert!(!session.is_active());
        assert!(!runtime.is_initialized());

        // Idempotent, including the implicit shutdown on drop.
        session.shutdown();
        drop(session);
        assert_eq!(runtime.shutdown_count(), 1);
    }

    #[test]
    fn test_drop_shuts_runtime_down() {
        let runtime = Arc::new(MockRuntime::new());
        drop(VrSession::initialize(runtime.clone()).unwrap());
        assert!(!runtime.is_initialized());
    }

    #[test]
    fn test_init_failure_reports_symbol_and_description() {
        let runtime = Arc::new(MockRuntime::without_hmd());
        match VrSession::initialize(runtime) {
            Err(VrError::Init {
                code,
                symbol,
                description,
            }) => {
                assert_eq!(code, 108);
                assert_eq!(symbol, "VRInitError_Init_HmdNotFound");
                assert_eq!(description, "Hmd Not Found (108)");
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("initialisation should fail without an HMD"),
        }
    }

    #[test]
    fn test_closed_session_refuses_overlays() {
        let runtime = Arc::new(MockRuntime::new());
        let mut session = VrSession::initialize(runtime).unwrap();
        session.shutdown();
        assert!(matches!(
            session.create_overlay("closed", "Closed"),
            Err(VrError::SessionClosed)
        ));
    }

    #[test]
    fn test_attach_to_controller() {
        let runtime = Arc::new(MockRuntime::new());
        let session = VrSession::initialize(runtime.clone()).unwrap();
        let overlay = session.create_overlay("attached", "Attached").unwrap();

        assert!(matches!(
            session.attach_to_controller(&overlay, ControllerRole::LeftHand),
            Err(VrError::NoController(ControllerRole::LeftHand))
        ));

        runtime.connect_controller(ControllerRole::LeftHand, 3);
        session
            .attach_to_controller(&overlay, ControllerRole::LeftHand)
            .unwrap();
        let snapshot = runtime.overlay_snapshot(overlay.handle()).unwrap();
        assert_eq!(
            snapshot.transform,
            Some(crate::vr::mock::MockTransform::TrackedDeviceRelative {
                device: 3,
                transform: HmdMatrix34::identity(),
            })
        );
    }
}
