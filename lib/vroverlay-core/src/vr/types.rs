use serde::{Deserialize, Serialize};

pub type OverlayHandle = u64;
pub type TrackedDeviceIndex = u32;

pub const HMD_DEVICE_INDEX: TrackedDeviceIndex = 0;
pub const INVALID_DEVICE_INDEX: TrackedDeviceIndex = u32::MAX;

pub const OVERLAY_MAX_KEY_LENGTH: usize = 128;
pub const OVERLAY_MAX_NAME_LENGTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct IntSize {
    pub width: u32,
    pub height: u32,
}

impl IntSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Linear RGB tint, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Row-major 3x4 affine transform. The last column is the translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HmdMatrix34 {
    pub m: [[f32; 4]; 3],
}

impl HmdMatrix34 {
    pub const fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    pub const fn translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, x],
                [0.0, 1.0, 0.0, y],
                [0.0, 0.0, 1.0, z],
            ],
        }
    }

    pub fn translation_part(&self) -> (f32, f32, f32) {
        (self.m[0][3], self.m[1][3], self.m[2][3])
    }

    /// Flattened in row-major order, the layout the runtime expects.
    pub fn to_row_major(&self) -> [f32; 12] {
        let mut out = [0.0; 12];
        for (row, values) in self.m.iter().enumerate() {
            out[row * 4..row * 4 + 4].copy_from_slice(values);
        }
        out
    }
}

impl Default for HmdMatrix34 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Portion of the submitted texture shown on the overlay, in UV space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureBounds {
    pub u_min: f32,
    pub v_min: f32,
    pub u_max: f32,
    pub v_max: f32,
}

impl Default for TextureBounds {
    fn default() -> Self {
        Self {
            u_min: 0.0,
            v_min: 0.0,
            u_max: 1.0,
            v_max: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorSpace {
    #[default]
    Auto,
    Gamma,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureType {
    OpenGl,
    Vulkan,
    DirectX,
}

/// A native GPU texture handed to the compositor by handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub texture_type: TextureType,
    pub color_space: ColorSpace,
    pub handle: u64,
}

impl Texture {
    pub fn opengl(texture_id: u32, color_space: ColorSpace) -> Self {
        Self {
            texture_type: TextureType::OpenGl,
            color_space,
            handle: texture_id as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrackingOrigin {
    Seated,
    #[default]
    Standing,
    RawAndUncalibrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationType {
    Scene,
    Overlay,
    Background,
    Utility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerRole {
    LeftHand,
    RightHand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedDeviceProperty {
    ModelNumber,
    SerialNumber,
    ManufacturerName,
    TrackingSystemName,
}
