use thiserror::Error;

/// Error codes reported by the overlay compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("VROverlayError_UnknownOverlay")]
    UnknownOverlay,
    #[error("VROverlayError_InvalidHandle")]
    InvalidHandle,
    #[error("VROverlayError_PermissionDenied")]
    PermissionDenied,
    #[error("VROverlayError_OverlayLimitExceeded")]
    OverlayLimitExceeded,
    #[error("VROverlayError_WrongVisibilityType")]
    WrongVisibilityType,
    #[error("VROverlayError_KeyTooLong")]
    KeyTooLong,
    #[error("VROverlayError_NameTooLong")]
    NameTooLong,
    #[error("VROverlayError_KeyInUse")]
    KeyInUse,
    #[error("VROverlayError_WrongTransformType")]
    WrongTransformType,
    #[error("VROverlayError_InvalidTrackedDevice")]
    InvalidTrackedDevice,
    #[error("VROverlayError_InvalidParameter")]
    InvalidParameter,
    #[error("VROverlayError_RequestFailed")]
    RequestFailed,
    #[error("VROverlayError_InvalidTexture")]
    InvalidTexture,
    #[error("VROverlayError_UnableToLoadFile")]
    UnableToLoadFile,
    #[error("VROverlayError_TimedOut")]
    TimedOut,
    #[error("VROverlayError_Unknown({0})")]
    Other(i32),
}

impl OverlayError {
    /// Maps a raw compositor result. `0` is success and maps to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        let error = match code {
            0 => return None,
            10 => Self::UnknownOverlay,
            11 => Self::InvalidHandle,
            12 => Self::PermissionDenied,
            13 => Self::OverlayLimitExceeded,
            14 => Self::WrongVisibilityType,
            15 => Self::KeyTooLong,
            16 => Self::NameTooLong,
            17 => Self::KeyInUse,
            18 => Self::WrongTransformType,
            19 => Self::InvalidTrackedDevice,
            20 => Self::InvalidParameter,
            23 => Self::RequestFailed,
            24 => Self::InvalidTexture,
            25 => Self::UnableToLoadFile,
            34 => Self::TimedOut,
            other => Self::Other(other),
        };
        Some(error)
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::UnknownOverlay => 10,
            Self::InvalidHandle => 11,
            Self::PermissionDenied => 12,
            Self::OverlayLimitExceeded => 13,
            Self::WrongVisibilityType => 14,
            Self::KeyTooLong => 15,
            Self::NameTooLong => 16,
            Self::KeyInUse => 17,
            Self::WrongTransformType => 18,
            Self::InvalidTrackedDevice => 19,
            Self::InvalidParameter => 20,
            Self::RequestFailed => 23,
            Self::InvalidTexture => 24,
            Self::UnableToLoadFile => 25,
            Self::TimedOut => 34,
            Self::Other(code) => *code,
        }
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Error)]
pub enum VrError {
    #[error("Failed to initialise the VR runtime ({symbol}, {description})")]
    Init {
        code: i32,
        symbol: String,
        description: String,
    },
    #[error("Got error: {} ({error}) from function: {function}", .error.code())]
    Overlay {
        function: &'static str,
        error: OverlayError,
    },
    #[error("Got error: {code} calling function: {function}")]
    TrackedProperty { function: &'static str, code: i32 },
    #[error("No tracked device for controller role {0:?}")]
    NoController(crate::vr::ControllerRole),
    #[error("VR session has been shut down")]
    SessionClosed,
    #[error("Render failed: {0}")]
    Render(String),
}

pub type VrResult<T> = Result<T, VrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_code_is_not_an_error() {
        assert_eq!(OverlayError::from_code(0), None);
    }

    #[test]
    fn test_known_and_unknown_codes() {
        assert_eq!(OverlayError::from_code(17), Some(OverlayError::KeyInUse));
        assert_eq!(OverlayError::from_code(99), Some(OverlayError::Other(99)));
        assert_eq!(OverlayError::Other(99).code(), 99);
        assert_eq!(OverlayError::KeyInUse.name(), "VROverlayError_KeyInUse");
    }

    #[test]
    fn test_overlay_error_message_names_function() {
        let error = VrError::Overlay {
            function: "VROverlay.ShowOverlay",
            error: OverlayError::UnknownOverlay,
        };
        assert_eq!(
            error.to_string(),
            "Got error: 10 (VROverlayError_UnknownOverlay) from function: VROverlay.ShowOverlay"
        );
    }
}
