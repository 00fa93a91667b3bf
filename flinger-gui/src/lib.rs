//! Buffer exchange between a producer and the compositor.
//!
//! [`SurfaceProducer`] is the producer contract. [`BufferQueue`] implements it
//! in-process and also exposes the consumer side (latching frames). The
//! `flinger-binder` crate carries the same contract across a socket.

pub mod buffer;
pub mod error;
pub mod producer;
pub mod queue;
pub mod slot;

pub use buffer::{BufferId, BufferUsage, GraphicBuffer, GraphicBufferAlloc, HandleAllocator, PixelFormat};
pub use error::{ProducerError, StatusTail, TransportError};
pub use producer::{
    DequeueResult, NativeWindowApi, QueryKind, QueueBufferInput, QueueBufferOutput, Rect, ScalingMode, SurfaceProducer,
    SyncFence, Transform,
};
pub use queue::{BufferQueue, FrameAvailableListener, LatchedFrame};
pub use slot::{SlotState, MIN_BUFFER_SLOTS, NUM_BUFFER_SLOTS};
