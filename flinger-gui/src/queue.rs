//! In-process buffer queue: the local [`SurfaceProducer`] and its consumer side.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use flinger_core::config::BufferQueueConfig;

use crate::buffer::{BufferUsage, GraphicBuffer, GraphicBufferAlloc, HandleAllocator, PixelFormat};
use crate::error::ProducerError;
use crate::producer::{
    saturate_i32, DequeueResult, NativeWindowApi, QueryKind, QueueBufferInput, QueueBufferOutput,
    SurfaceProducer,
};
use crate::slot::{SlotState, SlotTable, MIN_BUFFER_SLOTS, NUM_BUFFER_SLOTS};

/// Usage bits the consumer always adds to producer requests.
pub const CONSUMER_USAGE: BufferUsage = BufferUsage::HW_TEXTURE;

const MIN_UNDEQUEUED_BUFFERS: i32 = 2;

/// Buffer sizes must fit the signed crop rectangle and query replies.
fn check_dimensions(width: u32, height: u32) -> Result<(), ProducerError> {
    if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
        return Err(ProducerError::BadValue(format!(
            "buffer size {}x{} exceeds {}",
            width,
            height,
            i32::MAX
        )));
    }
    Ok(())
}

/// Notified (outside the queue lock) whenever a frame is queued.
pub trait FrameAvailableListener: Send + Sync {
    fn on_frame_available(&self);
}

impl<F> FrameAvailableListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_frame_available(&self) {
        self()
    }
}

/// A frame taken by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatchedFrame {
    pub slot: i32,
    pub buffer: Arc<GraphicBuffer>,
    pub input: QueueBufferInput,
    /// Stereo layout word in effect when the frame was queued.
    pub layout: u32,
    pub frame_number: u64,
}

#[derive(Debug)]
struct PendingFrame {
    slot: usize,
    input: QueueBufferInput,
    layout: u32,
    frame_number: u64,
}

struct QueueState {
    slots: SlotTable,
    pending: VecDeque<PendingFrame>,
    connected: Option<NativeWindowApi>,
    abandoned: bool,
    synchronous: bool,
    /// Slot last latched; Free, but not handed out while it is current.
    current_slot: Option<usize>,
    current_size: Option<(u32, u32)>,
    default_width: u32,
    default_height: u32,
    default_format: PixelFormat,
    default_buffer_count: usize,
    transform_hint: u32,
    layout: u32,
    frame_counter: u64,
    listener: Option<Arc<dyn FrameAvailableListener>>,
}

impl QueueState {
    fn check_alive(&self) -> Result<(), ProducerError> {
        if self.abandoned {
            Err(ProducerError::NoInit)
        } else {
            Ok(())
        }
    }

    fn output(&self) -> QueueBufferOutput {
        QueueBufferOutput {
            width: self.default_width,
            height: self.default_height,
            transform_hint: self.transform_hint,
            num_pending_buffers: self.pending.len() as u32,
        }
    }

    fn tear_down(&mut self) {
        self.slots.free_all_buffers();
        self.pending.clear();
        self.current_slot = None;
        self.connected = None;
    }

    /// Picks a Free slot: one whose buffer already fits, else the lowest.
    fn find_free_slot(&self, width: u32, height: u32, format: PixelFormat, usage: BufferUsage) -> Option<usize> {
        let mut fallback = None;
        for idx in self.slots.indices_in(SlotState::Free) {
            if Some(idx) == self.current_slot {
                continue;
            }
            let fits = self
                .slots
                .slot(idx)
                .buffer
                .as_ref()
                .map_or(false, |buffer| buffer.matches(width, height, format, usage));
            if fits {
                return Some(idx);
            }
            fallback.get_or_insert(idx);
        }
        fallback
    }
}

/// The local buffer queue.
///
/// One mutex guards all state; a condition variable implements the
/// synchronous-mode waits in `dequeue_buffer` and `queue_buffer`.
pub struct BufferQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    allocator: Arc<dyn GraphicBufferAlloc>,
}

impl BufferQueue {
    pub fn new(config: &BufferQueueConfig) -> Self {
        Self::with_allocator(config, Arc::new(HandleAllocator))
    }

    pub fn with_allocator(config: &BufferQueueConfig, allocator: Arc<dyn GraphicBufferAlloc>) -> Self {
        let buffer_count = config.buffer_count.clamp(MIN_BUFFER_SLOTS, NUM_BUFFER_SLOTS);
        let state = QueueState {
            slots: SlotTable::new(buffer_count),
            pending: VecDeque::new(),
            connected: None,
            abandoned: false,
            synchronous: config.synchronous,
            current_slot: None,
            current_size: None,
            default_width: config.default_width.max(1),
            default_height: config.default_height.max(1),
            default_format: PixelFormat(config.default_format),
            default_buffer_count: buffer_count,
            transform_hint: config.transform_hint,
            layout: 0,
            frame_counter: 0,
            listener: None,
        };
        BufferQueue {
            state: Mutex::new(state),
            changed: Condvar::new(),
            allocator,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, QueueState>) -> MutexGuard<'a, QueueState> {
        self.changed.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    // Consumer side.

    /// Takes the next queued frame, if any.
    ///
    /// Synchronous mode latches in FIFO order. Asynchronous mode latches the
    /// newest frame and returns older pending slots to Free.
    pub fn latch(&self) -> Option<LatchedFrame> {
        let mut state = self.lock();
        let frame = if state.synchronous {
            state.pending.pop_front()?
        } else {
            let newest = state.pending.pop_back()?;
            while let Some(dropped) = state.pending.pop_front() {
                debug!("Dropping unlatched frame {} in slot {}", dropped.frame_number, dropped.slot);
                if let Err(err) = state.slots.transition(dropped.slot, SlotState::Free) {
                    warn!("Could not release dropped slot {}: {}", dropped.slot, err);
                }
            }
            newest
        };
        self.changed.notify_all();

        if let Err(err) = state.slots.transition(frame.slot, SlotState::Free) {
            warn!("Latched slot {} in unexpected state: {}", frame.slot, err);
            return None;
        }
        let Some(buffer) = state.slots.slot(frame.slot).buffer.clone() else {
            warn!("Latched slot {} has no buffer", frame.slot);
            return None;
        };
        state.current_slot = Some(frame.slot);
        state.current_size = Some((buffer.width, buffer.height));
        debug!("Latched frame {} from slot {}", frame.frame_number, frame.slot);
        Some(LatchedFrame {
            slot: frame.slot as i32,
            buffer,
            input: frame.input,
            layout: frame.layout,
            frame_number: frame.frame_number,
        })
    }

    /// Compositor-side teardown. Every later producer call fails with `NoInit`.
    pub fn abandon(&self) {
        let mut state = self.lock();
        if state.abandoned {
            return;
        }
        state.tear_down();
        state.abandoned = true;
        state.listener = None;
        self.changed.notify_all();
        info!("Buffer queue abandoned");
    }

    /// Disconnects whatever producer is connected. Used when the producer's
    /// process goes away. Returns the api that was connected.
    pub fn force_disconnect(&self) -> Option<NativeWindowApi> {
        let mut state = self.lock();
        let api = state.connected;
        let had_dequeued = state.slots.any_dequeued();
        if api.is_none() && !had_dequeued {
            return None;
        }
        state.tear_down();
        self.changed.notify_all();
        info!(
            "Producer force-disconnected (api: {:?}, reclaimed dequeued slots: {})",
            api, had_dequeued
        );
        api
    }

    /// Tears the queue down only if `api` is the connected producer.
    /// Returns whether it was.
    pub fn force_disconnect_if(&self, api: NativeWindowApi) -> bool {
        let mut state = self.lock();
        if state.connected != Some(api) {
            debug!("Force-disconnect of {} skipped, connected api is {:?}", api, state.connected);
            return false;
        }
        state.tear_down();
        self.changed.notify_all();
        info!("Producer with api {} force-disconnected", api);
        true
    }

    pub fn set_frame_available_listener(&self, listener: Arc<dyn FrameAvailableListener>) {
        self.lock().listener = Some(listener);
    }

    pub fn set_default_buffer_size(&self, width: u32, height: u32) -> Result<(), ProducerError> {
        if width == 0 || height == 0 {
            return Err(ProducerError::BadValue(format!(
                "default buffer size {}x{} must be non-zero",
                width, height
            )));
        }
        check_dimensions(width, height)?;
        let mut state = self.lock();
        state.default_width = width;
        state.default_height = height;
        Ok(())
    }

    pub fn set_default_format(&self, format: PixelFormat) -> Result<(), ProducerError> {
        if !format.is_specified() {
            return Err(ProducerError::BadValue("default format must be specified".to_string()));
        }
        self.lock().default_format = format;
        Ok(())
    }

    pub fn set_transform_hint(&self, hint: u32) {
        self.lock().transform_hint = hint;
    }

    pub fn slot_state(&self, slot: i32) -> Option<SlotState> {
        let state = self.lock();
        state.slots.check_index(slot).ok().map(|idx| state.slots.state(idx))
    }

    pub fn connected_api(&self) -> Option<NativeWindowApi> {
        self.lock().connected
    }

    pub fn pending_frames(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_synchronous(&self) -> bool {
        self.lock().synchronous
    }
}

impl SurfaceProducer for BufferQueue {
    fn request_buffer(&self, slot: i32) -> Result<Option<Arc<GraphicBuffer>>, ProducerError> {
        let state = self.lock();
        state.check_alive()?;
        state.slots.request_buffer(slot)
    }

    fn set_buffer_count(&self, count: i32) -> Result<(), ProducerError> {
        let mut state = self.lock();
        state.check_alive()?;
        let count = match count {
            0 => state.default_buffer_count,
            n => usize::try_from(n)
                .map_err(|_| ProducerError::BadValue(format!("buffer count {} is negative", n)))?,
        };
        state.slots.resize(count)?;
        state.pending.clear();
        state.current_slot = None;
        self.changed.notify_all();
        debug!("Buffer count set to {}", count);
        Ok(())
    }

    fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Result<DequeueResult, ProducerError> {
        if (width == 0) != (height == 0) {
            return Err(ProducerError::BadValue(format!(
                "width and height must both be zero or both be set, got {}x{}",
                width, height
            )));
        }
        check_dimensions(width, height)?;
        let usage = usage | CONSUMER_USAGE;

        let mut state = self.lock();
        let idx = loop {
            state.check_alive()?;
            let (w, h) = if width == 0 {
                (state.default_width, state.default_height)
            } else {
                (width, height)
            };
            let fmt = if format.is_specified() { format } else { state.default_format };

            if let Some(idx) = state.find_free_slot(w, h, fmt, usage) {
                break idx;
            }
            if state.pending.is_empty() {
                return Err(ProducerError::NoFreeSlot);
            }
            if state.synchronous {
                debug!("No free slot, waiting for the consumer to latch");
                state = self.wait(state);
                continue;
            }
            if let Some(oldest) = state.pending.pop_front() {
                debug!("Reclaiming unlatched frame {} in slot {}", oldest.frame_number, oldest.slot);
                state.slots.transition(oldest.slot, SlotState::Free)?;
            }
        };

        let (w, h) = if width == 0 {
            (state.default_width, state.default_height)
        } else {
            (width, height)
        };
        let fmt = if format.is_specified() { format } else { state.default_format };

        let needs_reallocation = !state
            .slots
            .slot(idx)
            .buffer
            .as_ref()
            .map_or(false, |buffer| buffer.matches(w, h, fmt, usage));
        if needs_reallocation {
            let buffer = self.allocator.create_graphic_buffer(w, h, fmt, usage)?;
            state.slots.bind_buffer(idx, Arc::new(buffer));
        }
        state.slots.transition(idx, SlotState::Dequeued)?;
        Ok(DequeueResult {
            slot: idx as i32,
            needs_reallocation,
        })
    }

    fn queue_buffer(&self, slot: i32, input: QueueBufferInput) -> Result<QueueBufferOutput, ProducerError> {
        let mut state = self.lock();
        state.check_alive()?;
        let idx = state.slots.check_index(slot)?;
        if state.slots.state(idx) != SlotState::Dequeued {
            return Err(ProducerError::NotDequeued(slot));
        }

        while state.synchronous && !state.pending.is_empty() {
            debug!("Synchronous mode, waiting for frame {} to be latched", state.frame_counter);
            state = self.wait(state);
            state.check_alive()?;
            // A disconnect or resize while waiting may have freed the slot.
            if state.slots.check_index(slot).is_err() || state.slots.state(idx) != SlotState::Dequeued {
                return Err(ProducerError::NotDequeued(slot));
            }
        }

        state.slots.transition(idx, SlotState::Queued)?;
        state.frame_counter += 1;
        let frame_number = state.frame_counter;
        let layout = state.layout;
        state.pending.push_back(PendingFrame {
            slot: idx,
            input,
            layout,
            frame_number,
        });
        let output = state.output();
        let listener = state.listener.clone();
        drop(state);

        debug!("Queued frame {} in slot {}", frame_number, slot);
        if let Some(listener) = listener {
            listener.on_frame_available();
        }
        Ok(output)
    }

    fn cancel_buffer(&self, slot: i32) -> Result<(), ProducerError> {
        let mut state = self.lock();
        if state.abandoned {
            warn!("cancel_buffer({}) on an abandoned queue ignored", slot);
            return Ok(());
        }
        let idx = match state.slots.check_index(slot) {
            Ok(idx) => idx,
            Err(_) => {
                warn!("cancel_buffer: slot {} out of range, ignored", slot);
                return Ok(());
            }
        };
        if state.slots.state(idx) != SlotState::Dequeued {
            warn!(
                "cancel_buffer: slot {} is {:?}, not dequeued, ignored",
                slot,
                state.slots.state(idx)
            );
            return Ok(());
        }
        state.slots.transition(idx, SlotState::Free)?;
        self.changed.notify_all();
        Ok(())
    }

    fn query(&self, what: i32) -> Result<i32, ProducerError> {
        let state = self.lock();
        state.check_alive()?;
        let (current_width, current_height) = state
            .current_size
            .unwrap_or((state.default_width, state.default_height));
        let value = match QueryKind::try_from(what)? {
            QueryKind::Width => saturate_i32(current_width),
            QueryKind::Height => saturate_i32(current_height),
            QueryKind::Format => saturate_i32(state.default_format.0),
            QueryKind::Usage => CONSUMER_USAGE.bits() as i32,
            QueryKind::MinUndequeuedBuffers => {
                if state.synchronous {
                    MIN_UNDEQUEUED_BUFFERS - 1
                } else {
                    MIN_UNDEQUEUED_BUFFERS
                }
            }
            QueryKind::DefaultWidth => saturate_i32(state.default_width),
            QueryKind::DefaultHeight => saturate_i32(state.default_height),
            QueryKind::TransformHint => saturate_i32(state.transform_hint),
            QueryKind::ConsumerRunningBehind => i32::from(state.pending.len() >= 2),
            QueryKind::BufferCount => saturate_i32(state.slots.buffer_count()),
        };
        Ok(value)
    }

    fn set_synchronous_mode(&self, enabled: bool) -> Result<(), ProducerError> {
        let mut state = self.lock();
        state.check_alive()?;
        if state.synchronous != enabled {
            debug!("Synchronous mode {}", if enabled { "enabled" } else { "disabled" });
        }
        state.synchronous = enabled;
        if !enabled {
            self.changed.notify_all();
        }
        Ok(())
    }

    fn connect(&self, api: NativeWindowApi) -> Result<QueueBufferOutput, ProducerError> {
        let mut state = self.lock();
        state.check_alive()?;
        if let Some(connected) = state.connected {
            warn!("connect({}) refused, {} is already connected", api, connected);
            return Err(ProducerError::AlreadyConnected(connected));
        }
        state.connected = Some(api);
        info!("Producer connected with api {}", api);
        Ok(state.output())
    }

    fn disconnect(&self, api: NativeWindowApi) -> Result<(), ProducerError> {
        let mut state = self.lock();
        state.check_alive()?;
        if state.connected != Some(api) {
            warn!("disconnect({}) refused, connected api is {:?}", api, state.connected);
            return Err(ProducerError::InvalidApi(api));
        }
        state.tear_down();
        self.changed.notify_all();
        info!("Producer with api {} disconnected", api);
        Ok(())
    }

    fn set_layout(&self, layout: u32) -> Result<(), ProducerError> {
        let mut state = self.lock();
        state.check_alive()?;
        debug!("Layout word set to {:#010x}", layout);
        state.layout = layout;
        Ok(())
    }
}
