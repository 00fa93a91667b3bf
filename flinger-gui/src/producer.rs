//! The producer side of the buffer exchange: value types and the
//! [`SurfaceProducer`] contract shared by the local queue and the remote proxy.

use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;

use crate::buffer::{BufferUsage, GraphicBuffer, PixelFormat};
use crate::error::ProducerError;

/// Crop rectangle in buffer pixels. `right`/`bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

pub(crate) fn saturate_i32(value: impl TryInto<i32>) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Rect { left, top, right, bottom }
    }

    /// Sizes past `i32::MAX` saturate instead of wrapping negative.
    pub fn from_size(width: u32, height: u32) -> Self {
        Rect {
            left: 0,
            top: 0,
            right: saturate_i32(width),
            bottom: saturate_i32(height),
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

bitflags! {
    /// Buffer transform applied by the consumer at composition time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Transform: u32 {
        const FLIP_H = 0x01;
        const FLIP_V = 0x02;
        const ROT_90 = 0x04;
        const ROT_180 = Self::FLIP_H.bits() | Self::FLIP_V.bits();
        const ROT_270 = Self::ROT_180.bits() | Self::ROT_90.bits();
    }
}

/// How a buffer whose size differs from the window is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingMode {
    #[default]
    Freeze = 0,
    ScaleToWindow = 1,
    ScaleCrop = 2,
}

impl TryFrom<i32> for ScalingMode {
    type Error = ProducerError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ScalingMode::Freeze),
            1 => Ok(ScalingMode::ScaleToWindow),
            2 => Ok(ScalingMode::ScaleCrop),
            other => Err(ProducerError::BadValue(format!("unknown scaling mode {}", other))),
        }
    }
}

/// Opaque sync fence handle. The queue never waits on it; it is passed
/// through to whoever latches the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncFence(pub u64);

/// Per-frame metadata supplied with `queue_buffer`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueBufferInput {
    pub crop: Rect,
    pub transform: Transform,
    pub scaling_mode: ScalingMode,
    /// Presentation timestamp in nanoseconds.
    pub timestamp: i64,
    pub fence: Option<SyncFence>,
}

/// What the producer learns about the consumer after connect/queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueBufferOutput {
    pub width: u32,
    pub height: u32,
    pub transform_hint: u32,
    pub num_pending_buffers: u32,
}

/// Producer api family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeWindowApi {
    Egl = 1,
    Cpu = 2,
    Media = 3,
    Camera = 4,
}

impl NativeWindowApi {
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for NativeWindowApi {
    type Error = ProducerError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NativeWindowApi::Egl),
            2 => Ok(NativeWindowApi::Cpu),
            3 => Ok(NativeWindowApi::Media),
            4 => Ok(NativeWindowApi::Camera),
            other => Err(ProducerError::BadValue(format!("unknown api {}", other))),
        }
    }
}

impl fmt::Display for NativeWindowApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeWindowApi::Egl => "egl",
            NativeWindowApi::Cpu => "cpu",
            NativeWindowApi::Media => "media",
            NativeWindowApi::Camera => "camera",
        };
        f.write_str(name)
    }
}

/// Codes accepted by [`SurfaceProducer::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Width = 0,
    Height = 1,
    Format = 2,
    MinUndequeuedBuffers = 3,
    DefaultWidth = 6,
    DefaultHeight = 7,
    TransformHint = 8,
    ConsumerRunningBehind = 9,
    Usage = 10,
    BufferCount = 11,
}

impl QueryKind {
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for QueryKind {
    type Error = ProducerError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let kind = match value {
            0 => QueryKind::Width,
            1 => QueryKind::Height,
            2 => QueryKind::Format,
            3 => QueryKind::MinUndequeuedBuffers,
            6 => QueryKind::DefaultWidth,
            7 => QueryKind::DefaultHeight,
            8 => QueryKind::TransformHint,
            9 => QueryKind::ConsumerRunningBehind,
            10 => QueryKind::Usage,
            11 => QueryKind::BufferCount,
            other => return Err(ProducerError::UnknownQuery(other)),
        };
        Ok(kind)
    }
}

/// Result of a successful dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeueResult {
    pub slot: i32,
    /// The slot was (re)allocated; the producer must call
    /// [`SurfaceProducer::request_buffer`] before drawing into it.
    pub needs_reallocation: bool,
}

/// The buffer producer contract.
///
/// Every call is synchronous. A remote implementation reports an unreachable
/// or misbehaving peer as [`ProducerError::Transport`]; it never substitutes
/// default values.
pub trait SurfaceProducer: Send + Sync {
    /// Returns the buffer currently bound to `slot`, if any.
    fn request_buffer(&self, slot: i32) -> Result<Option<Arc<GraphicBuffer>>, ProducerError>;

    /// Resizes the slot table. `0` restores the default count.
    fn set_buffer_count(&self, count: i32) -> Result<(), ProducerError>;

    /// Claims a free slot. A zero `width`, `height` or `format` selects the
    /// consumer's default.
    fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Result<DequeueResult, ProducerError>;

    /// Hands a filled slot to the consumer.
    fn queue_buffer(&self, slot: i32, input: QueueBufferInput) -> Result<QueueBufferOutput, ProducerError>;

    /// Returns a dequeued slot unused. Invalid slots are ignored; only a
    /// transport failure is reported.
    fn cancel_buffer(&self, slot: i32) -> Result<(), ProducerError>;

    fn query(&self, what: i32) -> Result<i32, ProducerError>;

    fn set_synchronous_mode(&self, enabled: bool) -> Result<(), ProducerError>;

    fn connect(&self, api: NativeWindowApi) -> Result<QueueBufferOutput, ProducerError>;

    fn disconnect(&self, api: NativeWindowApi) -> Result<(), ProducerError>;

    /// Sets the stereo layout word attached to subsequently queued frames.
    fn set_layout(&self, layout: u32) -> Result<(), ProducerError>;
}
