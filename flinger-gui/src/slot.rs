//! The buffer slot table.

use std::sync::Arc;
use tracing::debug;

use crate::buffer::GraphicBuffer;
use crate::error::ProducerError;

/// Upper bound on slots a queue can be configured with.
pub const NUM_BUFFER_SLOTS: usize = 32;
/// Lower bound on slots a queue can be configured with.
pub const MIN_BUFFER_SLOTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Owned by the queue, available to `dequeue_buffer`.
    Free,
    /// Owned by the producer.
    Dequeued,
    /// Owned by the queue, waiting to be latched.
    Queued,
}

#[derive(Debug, Clone)]
pub struct BufferSlot {
    pub state: SlotState,
    pub buffer: Option<Arc<GraphicBuffer>>,
    /// Table generation at the time `buffer` was bound.
    pub generation: u64,
}

impl Default for BufferSlot {
    fn default() -> Self {
        BufferSlot {
            state: SlotState::Free,
            buffer: None,
            generation: 0,
        }
    }
}

/// Fixed array of slots, of which the first `buffer_count` are in use.
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<BufferSlot>,
    buffer_count: usize,
    generation: u64,
}

impl SlotTable {
    pub fn new(buffer_count: usize) -> Self {
        SlotTable {
            slots: vec![BufferSlot::default(); NUM_BUFFER_SLOTS],
            buffer_count: buffer_count.clamp(MIN_BUFFER_SLOTS, NUM_BUFFER_SLOTS),
            generation: 0,
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Maps a wire slot index to a table index.
    pub fn check_index(&self, slot: i32) -> Result<usize, ProducerError> {
        usize::try_from(slot)
            .ok()
            .filter(|&idx| idx < self.buffer_count)
            .ok_or(ProducerError::BadIndex(slot))
    }

    pub fn slot(&self, idx: usize) -> &BufferSlot {
        &self.slots[idx]
    }

    pub fn state(&self, idx: usize) -> SlotState {
        self.slots[idx].state
    }

    /// The buffer bound to `slot` in the current generation.
    pub fn request_buffer(&self, slot: i32) -> Result<Option<Arc<GraphicBuffer>>, ProducerError> {
        let idx = self.check_index(slot)?;
        let entry = &self.slots[idx];
        Ok(entry
            .buffer
            .as_ref()
            .filter(|_| entry.generation == self.generation)
            .cloned())
    }

    pub fn bind_buffer(&mut self, idx: usize, buffer: Arc<GraphicBuffer>) {
        debug!("Slot {} bound to buffer {:?}", idx, buffer.id);
        let generation = self.generation;
        let entry = &mut self.slots[idx];
        entry.buffer = Some(buffer);
        entry.generation = generation;
    }

    /// Moves a slot between states.
    ///
    /// Legal moves: Free→Dequeued, Dequeued→Queued, Dequeued→Free, Queued→Free.
    pub fn transition(&mut self, idx: usize, to: SlotState) -> Result<(), ProducerError> {
        let from = self.slots[idx].state;
        match (from, to) {
            (SlotState::Free, SlotState::Dequeued)
            | (SlotState::Dequeued, SlotState::Queued)
            | (SlotState::Dequeued, SlotState::Free)
            | (SlotState::Queued, SlotState::Free) => {}
            (_, SlotState::Queued) => return Err(ProducerError::NotDequeued(idx as i32)),
            _ => {
                return Err(ProducerError::InvalidOperation(format!(
                    "slot {} cannot move from {:?} to {:?}",
                    idx, from, to
                )))
            }
        }
        debug!("Slot {}: {:?} -> {:?}", idx, from, to);
        self.slots[idx].state = to;
        Ok(())
    }

    /// Active slot indices in `state`, lowest first.
    pub fn indices_in(&self, state: SlotState) -> impl Iterator<Item = usize> + '_ {
        self.slots[..self.buffer_count]
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.state == state)
            .map(|(idx, _)| idx)
    }

    pub fn any_dequeued(&self) -> bool {
        self.indices_in(SlotState::Dequeued).next().is_some()
    }

    /// Drops every buffer, returns every slot to Free and bumps the generation.
    pub fn free_all_buffers(&mut self) {
        for entry in self.slots.iter_mut() {
            entry.state = SlotState::Free;
            entry.buffer = None;
        }
        self.generation += 1;
        debug!("All buffer slots freed, generation {}", self.generation);
    }

    /// Changes the active slot count. Fails while a slot is dequeued.
    pub fn resize(&mut self, buffer_count: usize) -> Result<(), ProducerError> {
        if self.any_dequeued() {
            return Err(ProducerError::InvalidOperation(
                "cannot change the buffer count while a buffer is dequeued".to_string(),
            ));
        }
        if !(MIN_BUFFER_SLOTS..=NUM_BUFFER_SLOTS).contains(&buffer_count) {
            return Err(ProducerError::BadValue(format!(
                "buffer count {} outside {}..={}",
                buffer_count, MIN_BUFFER_SLOTS, NUM_BUFFER_SLOTS
            )));
        }
        self.free_all_buffers();
        self.buffer_count = buffer_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferUsage, GraphicBufferAlloc, HandleAllocator, PixelFormat};
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn buffer() -> Arc<GraphicBuffer> {
        Arc::new(
            HandleAllocator
                .create_graphic_buffer(16, 16, PixelFormat::RGBA_8888, BufferUsage::HW_TEXTURE)
                .unwrap(),
        )
    }

    #[rstest]
    #[case(-1)]
    #[case(3)]
    #[case(32)]
    fn test_check_index_out_of_range(#[case] slot: i32) {
        let table = SlotTable::new(3);
        assert_eq!(table.check_index(slot), Err(ProducerError::BadIndex(slot)));
    }

    #[test]
    fn test_request_buffer_empty_slot() {
        let table = SlotTable::new(3);
        assert_eq!(table.request_buffer(0), Ok(None));
    }

    #[test]
    fn test_request_buffer_after_free_is_stale() {
        let mut table = SlotTable::new(3);
        table.bind_buffer(1, buffer());
        assert!(table.request_buffer(1).unwrap().is_some());
        table.free_all_buffers();
        assert_eq!(table.request_buffer(1), Ok(None));
        assert_eq!(table.generation(), 1);
    }

    #[test]
    fn test_free_to_queued_rejected() {
        let mut table = SlotTable::new(3);
        assert_eq!(table.transition(0, SlotState::Queued), Err(ProducerError::NotDequeued(0)));
        assert_eq!(table.state(0), SlotState::Free);
    }

    #[test]
    fn test_queued_to_dequeued_rejected() {
        let mut table = SlotTable::new(3);
        table.transition(0, SlotState::Dequeued).unwrap();
        table.transition(0, SlotState::Queued).unwrap();
        assert_matches!(
            table.transition(0, SlotState::Dequeued),
            Err(ProducerError::InvalidOperation(_))
        );
        table.transition(0, SlotState::Free).unwrap();
        table.transition(0, SlotState::Dequeued).unwrap();
    }

    #[test]
    fn test_resize_while_dequeued() {
        let mut table = SlotTable::new(3);
        table.transition(2, SlotState::Dequeued).unwrap();
        assert_matches!(table.resize(5), Err(ProducerError::InvalidOperation(_)));
        table.transition(2, SlotState::Free).unwrap();
        assert_eq!(table.resize(5), Ok(()));
        assert_eq!(table.buffer_count(), 5);
    }

    #[rstest]
    #[case(1)]
    #[case(33)]
    fn test_resize_out_of_bounds(#[case] count: usize) {
        let mut table = SlotTable::new(3);
        assert_matches!(table.resize(count), Err(ProducerError::BadValue(_)));
        assert_eq!(table.buffer_count(), 3);
    }

    #[test]
    fn test_indices_only_cover_active_slots() {
        let table = SlotTable::new(2);
        assert_eq!(table.indices_in(SlotState::Free).collect::<Vec<_>>(), vec![0, 1]);
    }
}
