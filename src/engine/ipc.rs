//! ### English
//! Packing of buffer descriptions for shipping to out-of-process clients.
//!
//! The first time a buffer travels to a client the message is `Full` (geometry, format,
//! stride); afterwards the client already caches it and an `Update` carrying only the id is
//! enough.
//!
//! ### 中文
//! 将缓冲区描述打包，以便发送给进程外的客户端。
//!
//! 缓冲区第一次发往客户端时消息为 `Full`（尺寸、格式、跨度）；
//! 之后客户端已缓存该缓冲区，只携带 id 的 `Update` 即可。

use dpi::PhysicalSize;

use super::buffer::{Buffer, BufferProperties, BufferUsage, PixelFormat};
use super::error::IpcError;

/// ### English
/// Whether a message carries the full description or only refers to a cached buffer.
///
/// ### 中文
/// 消息携带完整描述，还是仅引用已缓存的缓冲区。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IpcMsgType {
    Full,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IpcDirection {
    ToClient,
    FromClient,
}

/// ### English
/// Wire payload: plain integers plus file descriptors passed out of band.
///
/// ### 中文
/// 线上负载：普通整数，以及带外传递的文件描述符。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferIpcMessage {
    pub ints: Vec<u64>,
    pub fds: Vec<i32>,
}

impl BufferIpcMessage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// ### English
/// Platform-wide data a client needs once per connection (e.g. a device node).
///
/// ### 中文
/// 客户端每个连接只需获取一次的平台级数据（例如设备节点）。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformIpcPackage {
    pub ints: Vec<u64>,
    pub fds: Vec<i32>,
}

/// ### English
/// Buffer description recovered from a `Full` message on the receiving side.
///
/// ### 中文
/// 接收端从 `Full` 消息中还原出的缓冲区描述。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpcBufferDescriptor {
    pub buffer_id: u64,
    pub properties: BufferProperties,
    pub stride: u32,
}

/// ### English
/// Platform-specific (de)serialization of buffers.
///
/// ### 中文
/// 平台相关的缓冲区（反）序列化。
pub trait BufferIpcPacker: Send + Sync {
    fn pack_buffer(&self, message: &mut BufferIpcMessage, buffer: &Buffer, msg_type: IpcMsgType);

    /// ### English
    /// Applies a message received for `buffer`. Rejects messages describing another buffer.
    ///
    /// ### 中文
    /// 应用为 `buffer` 收到的消息。拒绝描述其它缓冲区的消息。
    fn unpack_buffer(&self, message: &BufferIpcMessage, buffer: &Buffer) -> Result<(), IpcError>;

    fn platform_package(&self) -> PlatformIpcPackage;
}

const FULL_LEN: usize = 6;
const UPDATE_LEN: usize = 1;

/// ### English
/// Software packer: `Full` = `[id, width, height, stride, format, usage]`, `Update` = `[id]`.
/// No descriptors are passed.
///
/// ### 中文
/// 软件打包器：`Full` = `[id, width, height, stride, format, usage]`，`Update` = `[id]`。
/// 不传递任何描述符。
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericIpcPacker;

impl GenericIpcPacker {
    /// ### English
    /// Decodes a `Full` message without a local buffer to compare against (client side).
    ///
    /// ### 中文
    /// 在没有本地缓冲区可比对的情况下解码 `Full` 消息（客户端侧）。
    pub fn decode(message: &BufferIpcMessage) -> Result<IpcBufferDescriptor, IpcError> {
        let ints = message.ints.as_slice();
        let [id, width, height, stride, format, usage] = ints else {
            return Err(match ints.len() {
                0 => IpcError::EmptyMessage,
                _ => IpcError::Malformed("expected a full buffer description"),
            });
        };

        let narrow =
            |value: u64| u32::try_from(value).map_err(|_| IpcError::Malformed("value out of range"));
        let format = PixelFormat::from_raw(narrow(*format)?)
            .ok_or(IpcError::Malformed("unknown pixel format"))?;
        let usage = match *usage {
            0 => BufferUsage::Hardware,
            1 => BufferUsage::Software,
            _ => return Err(IpcError::Malformed("unknown buffer usage")),
        };

        Ok(IpcBufferDescriptor {
            buffer_id: *id,
            properties: BufferProperties::new(
                PhysicalSize::new(narrow(*width)?, narrow(*height)?),
                format,
                usage,
            ),
            stride: narrow(*stride)?,
        })
    }
}

fn usage_code(usage: BufferUsage) -> u64 {
    match usage {
        BufferUsage::Hardware => 0,
        BufferUsage::Software => 1,
    }
}

impl BufferIpcPacker for GenericIpcPacker {
    fn pack_buffer(&self, message: &mut BufferIpcMessage, buffer: &Buffer, msg_type: IpcMsgType) {
        message.ints.push(buffer.id().as_u64());
        if msg_type == IpcMsgType::Full {
            let properties = buffer.properties();
            message.ints.extend([
                u64::from(properties.size.width),
                u64::from(properties.size.height),
                u64::from(buffer.stride()),
                u64::from(properties.format.as_raw()),
                usage_code(properties.usage),
            ]);
        }
    }

    fn unpack_buffer(&self, message: &BufferIpcMessage, buffer: &Buffer) -> Result<(), IpcError> {
        let expected = buffer.id().as_u64();
        match message.ints.len() {
            0 => Err(IpcError::EmptyMessage),
            UPDATE_LEN => match message.ints[0] {
                found if found == expected => Ok(()),
                found => Err(IpcError::BufferMismatch { expected, found }),
            },
            FULL_LEN => {
                let descriptor = Self::decode(message)?;
                if descriptor.buffer_id != expected {
                    return Err(IpcError::BufferMismatch {
                        expected,
                        found: descriptor.buffer_id,
                    });
                }
                if descriptor.properties != buffer.properties()
                    || descriptor.stride != buffer.stride()
                {
                    return Err(IpcError::Malformed("buffer geometry changed"));
                }
                Ok(())
            }
            _ => Err(IpcError::Malformed("unexpected message length")),
        }
    }

    fn platform_package(&self) -> PlatformIpcPackage {
        PlatformIpcPackage::default()
    }
}

/// ### English
/// A buffer lease prepared for shipping, tagged with the message kind it needs.
///
/// ### 中文
/// 准备发送的缓冲区租约，并标注其所需的消息类型。
#[derive(Clone, Debug)]
pub struct IpcResource {
    pub buffer: Buffer,
    pub msg_type: IpcMsgType,
    pub direction: IpcDirection,
}

impl IpcResource {
    pub fn pack(&self, packer: &dyn BufferIpcPacker) -> BufferIpcMessage {
        let mut message = BufferIpcMessage::new();
        packer.pack_buffer(&mut message, &self.buffer, self.msg_type);
        message
    }

    pub fn unpack(
        &self,
        packer: &dyn BufferIpcPacker,
        message: &BufferIpcMessage,
    ) -> Result<(), IpcError> {
        packer.unpack_buffer(message, &self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::buffer::{BufferAllocator, HeapAllocator};

    fn buffer() -> Buffer {
        let allocator: Arc<dyn BufferAllocator> = Arc::new(HeapAllocator::new());
        Buffer::allocate(
            &allocator,
            BufferProperties::new(
                PhysicalSize::new(32, 16),
                PixelFormat::Rgb565,
                BufferUsage::Software,
            ),
        )
        .unwrap()
    }

    #[test]
    fn full_message_describes_the_buffer() {
        let buffer = buffer();
        let resource = IpcResource {
            buffer: buffer.clone(),
            msg_type: IpcMsgType::Full,
            direction: IpcDirection::ToClient,
        };

        let message = resource.pack(&GenericIpcPacker);
        assert!(message.fds.is_empty());

        let descriptor = GenericIpcPacker::decode(&message).unwrap();
        assert_eq!(descriptor.buffer_id, buffer.id().as_u64());
        assert_eq!(descriptor.properties, buffer.properties());
        assert_eq!(descriptor.stride, 64);
        assert_eq!(resource.unpack(&GenericIpcPacker, &message), Ok(()));
    }

    #[test]
    fn update_message_only_carries_the_id() {
        let buffer = buffer();
        let mut message = BufferIpcMessage::new();
        GenericIpcPacker.pack_buffer(&mut message, &buffer, IpcMsgType::Update);
        assert_eq!(message.ints, vec![buffer.id().as_u64()]);
        assert!(GenericIpcPacker::decode(&message).is_err());
    }

    #[test]
    fn unpack_rejects_messages_for_other_buffers() {
        let (ours, theirs) = (buffer(), buffer());
        let mut message = BufferIpcMessage::new();
        GenericIpcPacker.pack_buffer(&mut message, &theirs, IpcMsgType::Full);

        assert_eq!(
            GenericIpcPacker.unpack_buffer(&message, &ours),
            Err(IpcError::BufferMismatch {
                expected: ours.id().as_u64(),
                found: theirs.id().as_u64(),
            })
        );
        assert_eq!(
            GenericIpcPacker.unpack_buffer(&BufferIpcMessage::new(), &ours),
            Err(IpcError::EmptyMessage)
        );
    }

    #[test]
    fn decode_rejects_unknown_format() {
        let message = BufferIpcMessage {
            ints: vec![1, 4, 4, 16, 99, 0],
            fds: Vec::new(),
        };
        assert_eq!(
            GenericIpcPacker::decode(&message),
            Err(IpcError::Malformed("unknown pixel format"))
        );
    }
}
