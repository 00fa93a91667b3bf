//! Graphic buffer handles and the allocator collaborator.

use bitflags::bitflags;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ProducerError;

/// Identifies one allocation. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

impl BufferId {
    fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        BufferId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuilds an id received from a peer.
    pub fn from_raw(raw: u64) -> Self {
        BufferId(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Pixel format code as exchanged with producers.
///
/// Zero means "unspecified": the queue substitutes its default format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub const UNSPECIFIED: PixelFormat = PixelFormat(0);
    pub const RGBA_8888: PixelFormat = PixelFormat(1);
    pub const RGBX_8888: PixelFormat = PixelFormat(2);
    pub const RGB_888: PixelFormat = PixelFormat(3);
    pub const RGB_565: PixelFormat = PixelFormat(4);
    pub const BGRA_8888: PixelFormat = PixelFormat(5);
    pub const NV12: PixelFormat = PixelFormat(0x100);

    pub fn is_specified(self) -> bool {
        self != Self::UNSPECIFIED
    }
}

bitflags! {
    /// Gralloc-style usage bits requested by a producer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const SW_READ_OFTEN = 0x0000_0003;
        const SW_WRITE_OFTEN = 0x0000_0030;
        const HW_TEXTURE = 0x0000_0100;
        const HW_RENDER = 0x0000_0200;
        const HW_COMPOSER = 0x0000_0800;
        const EXTERNAL_DISP = 0x0000_2000;
        const PROTECTED = 0x0000_4000;
    }
}

/// A graphics buffer allocation.
///
/// Slots hand these out as `Arc<GraphicBuffer>`; the compositor keeps its
/// own reference while a buffer is latched, so freeing a slot never pulls
/// memory out from under a draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicBuffer {
    pub id: BufferId,
    pub width: u32,
    pub height: u32,
    /// Row length in pixels.
    pub stride: u32,
    pub format: PixelFormat,
    pub usage: BufferUsage,
}

impl GraphicBuffer {
    /// Whether this allocation can serve a dequeue with the given parameters
    /// without reallocating.
    pub fn matches(&self, width: u32, height: u32, format: PixelFormat, usage: BufferUsage) -> bool {
        self.width == width && self.height == height && self.format == format && self.usage.contains(usage)
    }
}

/// The allocator collaborator the queue uses to back its slots.
pub trait GraphicBufferAlloc: Send + Sync {
    fn create_graphic_buffer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Result<GraphicBuffer, ProducerError>;
}

/// Allocator that only mints handles; stride is rounded up to 16 pixels.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandleAllocator;

impl GraphicBufferAlloc for HandleAllocator {
    fn create_graphic_buffer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Result<GraphicBuffer, ProducerError> {
        if width == 0 || height == 0 {
            return Err(ProducerError::AllocationFailed(format!(
                "cannot allocate a {}x{} buffer",
                width, height
            )));
        }
        if !format.is_specified() {
            return Err(ProducerError::AllocationFailed("format must be specified".to_string()));
        }
        let stride = width.checked_add(15).map(|w| w & !15).ok_or_else(|| {
            ProducerError::AllocationFailed(format!("width {} overflows stride", width))
        })?;
        Ok(GraphicBuffer {
            id: BufferId::new_unique(),
            width,
            height,
            stride,
            format,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_buffer_ids() {
        let id1 = BufferId::new_unique();
        let id2 = BufferId::new_unique();
        assert_ne!(id1, id2, "BufferId::new_unique should generate unique IDs.");
    }

    #[test]
    fn test_handle_allocator_rounds_stride() {
        let buffer = HandleAllocator
            .create_graphic_buffer(100, 50, PixelFormat::RGBA_8888, BufferUsage::HW_TEXTURE)
            .unwrap();
        assert_eq!(buffer.stride, 112);
        assert_eq!(buffer.width, 100);
        assert_eq!(buffer.height, 50);
    }

    #[test]
    fn test_handle_allocator_rejects_empty() {
        let result = HandleAllocator.create_graphic_buffer(0, 50, PixelFormat::RGBA_8888, BufferUsage::empty());
        assert!(matches!(result, Err(ProducerError::AllocationFailed(_))));
        let result = HandleAllocator.create_graphic_buffer(8, 8, PixelFormat::UNSPECIFIED, BufferUsage::empty());
        assert!(matches!(result, Err(ProducerError::AllocationFailed(_))));
    }

    #[test]
    fn test_matches_requires_usage_superset() {
        let buffer = HandleAllocator
            .create_graphic_buffer(
                64,
                64,
                PixelFormat::RGBA_8888,
                BufferUsage::HW_TEXTURE | BufferUsage::HW_RENDER,
            )
            .unwrap();
        assert!(buffer.matches(64, 64, PixelFormat::RGBA_8888, BufferUsage::HW_TEXTURE));
        assert!(!buffer.matches(64, 64, PixelFormat::RGBA_8888, BufferUsage::SW_READ_OFTEN));
        assert!(!buffer.matches(64, 32, PixelFormat::RGBA_8888, BufferUsage::HW_TEXTURE));
        assert!(!buffer.matches(64, 64, PixelFormat::RGB_565, BufferUsage::HW_TEXTURE));
    }
}
