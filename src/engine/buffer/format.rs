//! ### English
//! Pixel formats and allocation usage.
//!
//! ### 中文
//! 像素格式与分配用途。

use serde::{Deserialize, Serialize};

/// ### English
/// Pixel layout of a buffer. Only used to compute strides; pixels are never converted.
///
/// ### 中文
/// 缓冲区的像素布局；仅用于计算行跨度，从不做像素转换。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum PixelFormat {
    #[default]
    Abgr8888 = 1,
    Xbgr8888 = 2,
    Argb8888 = 3,
    Xrgb8888 = 4,
    Bgr888 = 5,
    Rgb565 = 6,
    Rgba5551 = 7,
    Rgba4444 = 8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Abgr8888
            | PixelFormat::Xbgr8888
            | PixelFormat::Argb8888
            | PixelFormat::Xrgb8888 => 4,
            PixelFormat::Bgr888 => 3,
            PixelFormat::Rgb565 | PixelFormat::Rgba5551 | PixelFormat::Rgba4444 => 2,
        }
    }

    /// ### English
    /// Converts a C ABI format code back into a `PixelFormat`.
    ///
    /// ### 中文
    /// 将 C ABI 的格式编码转换回 `PixelFormat`。
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => PixelFormat::Abgr8888,
            2 => PixelFormat::Xbgr8888,
            3 => PixelFormat::Argb8888,
            4 => PixelFormat::Xrgb8888,
            5 => PixelFormat::Bgr888,
            6 => PixelFormat::Rgb565,
            7 => PixelFormat::Rgba5551,
            8 => PixelFormat::Rgba4444,
            _ => return None,
        })
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// ### English
/// Who renders into the buffer: the GPU (`Hardware`) or the CPU (`Software`).
///
/// ### 中文
/// 谁向缓冲区渲染：GPU（`Hardware`）或 CPU（`Software`）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferUsage {
    #[default]
    Hardware,
    Software,
}
