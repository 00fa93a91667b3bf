//! Per-connection view of a shared [`BufferQueue`].
//!
//! Several producer processes may hold connections to the same queue. A
//! [`ProducerSession`] remembers what its own peer owns, so that cleanup after
//! the peer goes away touches nothing that belongs to another peer.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use flinger_gui::{
    BufferQueue, BufferUsage, DequeueResult, GraphicBuffer, NativeWindowApi, PixelFormat, ProducerError,
    QueueBufferInput, QueueBufferOutput, SurfaceProducer,
};

#[derive(Debug, Default)]
struct Ownership {
    /// Api this peer connected with, until it disconnects.
    api: Option<NativeWindowApi>,
    /// Slots this peer dequeued and has not yet queued or cancelled.
    dequeued: BTreeSet<i32>,
}

pub struct ProducerSession {
    queue: Arc<BufferQueue>,
    owned: Mutex<Ownership>,
}

impl ProducerSession {
    pub fn new(queue: Arc<BufferQueue>) -> Self {
        ProducerSession {
            queue,
            owned: Mutex::new(Ownership::default()),
        }
    }

    fn owned(&self) -> MutexGuard<'_, Ownership> {
        self.owned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connected_api(&self) -> Option<NativeWindowApi> {
        self.owned().api
    }

    pub fn dequeued_slots(&self) -> Vec<i32> {
        self.owned().dequeued.iter().copied().collect()
    }

    /// Cleanup after the peer is gone.
    ///
    /// The connected producer takes the whole queue down with it. A peer that
    /// never connected only hands back the slots it still held.
    pub fn release(&self) {
        let owned = std::mem::take(&mut *self.owned());
        if let Some(api) = owned.api {
            if self.queue.force_disconnect_if(api) {
                info!("Connected producer ({}) went away; queue reclaimed", api);
            }
            return;
        }
        for slot in owned.dequeued {
            debug!("Returning slot {} held by a departed peer", slot);
            // Lenient: a slot already freed elsewhere is a logged no-op.
            let _ = self.queue.cancel_buffer(slot);
        }
    }
}

impl SurfaceProducer for ProducerSession {
    fn request_buffer(&self, slot: i32) -> Result<Option<Arc<GraphicBuffer>>, ProducerError> {
        self.queue.request_buffer(slot)
    }

    fn set_buffer_count(&self, count: i32) -> Result<(), ProducerError> {
        self.queue.set_buffer_count(count)?;
        self.owned().dequeued.clear();
        Ok(())
    }

    fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Result<DequeueResult, ProducerError> {
        let result = self.queue.dequeue_buffer(width, height, format, usage)?;
        self.owned().dequeued.insert(result.slot);
        Ok(result)
    }

    fn queue_buffer(&self, slot: i32, input: QueueBufferInput) -> Result<QueueBufferOutput, ProducerError> {
        let output = self.queue.queue_buffer(slot, input)?;
        self.owned().dequeued.remove(&slot);
        Ok(output)
    }

    fn cancel_buffer(&self, slot: i32) -> Result<(), ProducerError> {
        self.queue.cancel_buffer(slot)?;
        self.owned().dequeued.remove(&slot);
        Ok(())
    }

    fn query(&self, what: i32) -> Result<i32, ProducerError> {
        self.queue.query(what)
    }

    fn set_synchronous_mode(&self, enabled: bool) -> Result<(), ProducerError> {
        self.queue.set_synchronous_mode(enabled)
    }

    fn connect(&self, api: NativeWindowApi) -> Result<QueueBufferOutput, ProducerError> {
        let output = self.queue.connect(api)?;
        self.owned().api = Some(api);
        Ok(output)
    }

    fn disconnect(&self, api: NativeWindowApi) -> Result<(), ProducerError> {
        self.queue.disconnect(api)?;
        let mut owned = self.owned();
        owned.api = None;
        owned.dequeued.clear();
        Ok(())
    }

    fn set_layout(&self, layout: u32) -> Result<(), ProducerError> {
        self.queue.set_layout(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flinger_core::config::BufferQueueConfig;
    use flinger_gui::SlotState;
    use pretty_assertions::assert_eq;

    fn dequeue(session: &ProducerSession) -> i32 {
        session
            .dequeue_buffer(0, 0, PixelFormat::UNSPECIFIED, BufferUsage::empty())
            .unwrap()
            .slot
    }

    #[test]
    fn test_tracks_connection_and_slots() {
        let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
        let session = ProducerSession::new(queue.clone());
        session.connect(NativeWindowApi::Cpu).unwrap();
        let a = dequeue(&session);
        let b = dequeue(&session);
        assert_eq!(session.connected_api(), Some(NativeWindowApi::Cpu));
        assert_eq!(session.dequeued_slots().len(), 2);

        session.queue_buffer(a, QueueBufferInput::default()).unwrap();
        session.cancel_buffer(b).unwrap();
        assert!(session.dequeued_slots().is_empty());

        session.disconnect(NativeWindowApi::Cpu).unwrap();
        assert_eq!(session.connected_api(), None);
    }

    #[test]
    fn test_failed_connect_is_not_ownership() {
        let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
        let owner = ProducerSession::new(queue.clone());
        let other = ProducerSession::new(queue.clone());
        owner.connect(NativeWindowApi::Egl).unwrap();
        assert!(other.connect(NativeWindowApi::Media).is_err());
        assert_eq!(other.connected_api(), None);

        other.release();
        assert_eq!(queue.connected_api(), Some(NativeWindowApi::Egl));
    }

    #[test]
    fn test_release_of_unconnected_peer_returns_only_its_slots() {
        let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
        let owner = ProducerSession::new(queue.clone());
        let helper = ProducerSession::new(queue.clone());
        owner.connect(NativeWindowApi::Egl).unwrap();
        let mine = dequeue(&owner);
        let theirs = dequeue(&helper);

        helper.release();
        assert_eq!(queue.slot_state(theirs), Some(SlotState::Free));
        assert_eq!(queue.slot_state(mine), Some(SlotState::Dequeued));
        assert_eq!(queue.connected_api(), Some(NativeWindowApi::Egl));

        owner.release();
        assert_eq!(queue.slot_state(mine), Some(SlotState::Free));
        assert_eq!(queue.connected_api(), None);
    }
}
