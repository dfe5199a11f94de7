//! ### English
//! Queue configuration, loadable from JSON.
//!
//! Every field has a default, so a partial document (or `{}`) is valid.
//!
//! ### 中文
//! 队列配置，可从 JSON 加载。
//!
//! 所有字段都有默认值，因此部分文档（或 `{}`）也是合法的。

use std::path::Path;

use dpi::PhysicalSize;
use serde::{Deserialize, Serialize};

use super::buffer::{BufferProperties, BufferUsage, PixelFormat};
use super::error::ConfigError;
use super::queue::{DEFAULT_CAPACITY, MAX_CAPACITY, Policy};

/// ### English
/// Settings for one `BufferQueue`: buffer count, selection policy and buffer geometry.
///
/// ### 中文
/// 单个 `BufferQueue` 的设置：缓冲区数量、选择策略与缓冲区几何参数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// ### English
    /// Target buffer count (`1..=MAX_CAPACITY`). Default: 3 (triple buffering).
    ///
    /// ### 中文
    /// 目标缓冲区数量（`1..=MAX_CAPACITY`）。默认：3（三缓冲）。
    pub capacity: usize,
    pub policy: Policy,
    pub buffer: BufferConfig,
    /// ### English
    /// Allocate every buffer up front instead of on first demand.
    ///
    /// ### 中文
    /// 预先分配全部缓冲区，而不是在首次需要时分配。
    pub preallocate: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            capacity: DEFAULT_CAPACITY,
            policy: Policy::default(),
            buffer: BufferConfig::default(),
            preallocate: false,
        }
    }
}

/// ### English
/// Geometry and format shared by every buffer of one queue. Default: 640x480.
///
/// ### 中文
/// 同一队列中所有缓冲区共享的尺寸与格式。默认：640x480。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: BufferUsage,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            width: 640,
            height: 480,
            format: PixelFormat::default(),
            usage: BufferUsage::default(),
        }
    }
}

impl QueueConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: QueueConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        log::debug!("loading queue config from {}", path.display());
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CAPACITY).contains(&self.capacity) {
            return Err(ConfigError::InvalidCapacity(self.capacity));
        }
        if self.buffer.width == 0 || self.buffer.height == 0 {
            return Err(ConfigError::InvalidSize {
                width: self.buffer.width,
                height: self.buffer.height,
            });
        }
        Ok(())
    }

    pub fn buffer_properties(&self) -> BufferProperties {
        BufferProperties::new(
            PhysicalSize::new(self.buffer.width, self.buffer.height),
            self.buffer.format,
            self.buffer.usage,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = QueueConfig::from_json_str("{}").unwrap();
        assert_eq!(config, QueueConfig::default());
        assert_eq!(config.capacity, 3);
        assert_eq!(config.policy, Policy::Queueing);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = QueueConfig::from_json_str(
            r#"{ "capacity": 2, "policy": "frame_dropping", "buffer": { "width": 1920, "format": "rgb565" } }"#,
        )
        .unwrap();

        assert_eq!(config.capacity, 2);
        assert_eq!(config.policy, Policy::FrameDropping);
        assert_eq!(config.buffer.width, 1920);
        assert_eq!(config.buffer.height, 480);
        assert_eq!(config.buffer_properties().format, PixelFormat::Rgb565);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            QueueConfig::from_json_str(r#"{ "capacity": 0 }"#),
            Err(ConfigError::InvalidCapacity(0))
        ));
        assert!(matches!(
            QueueConfig::from_json_str(r#"{ "capacity": 17 }"#),
            Err(ConfigError::InvalidCapacity(17))
        ));
        assert!(matches!(
            QueueConfig::from_json_str(r#"{ "buffer": { "height": 0 } }"#),
            Err(ConfigError::InvalidSize {
                width: 640,
                height: 0
            })
        ));
        assert!(matches!(
            QueueConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            QueueConfig::from_path("/nonexistent/xian-buffer-queue.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
