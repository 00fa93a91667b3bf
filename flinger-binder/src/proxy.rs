//! Producer-side handle to a remote buffer queue.

use std::sync::Arc;

use flinger_gui::{
    BufferUsage, DequeueResult, GraphicBuffer, NativeWindowApi, PixelFormat, ProducerError, QueueBufferInput,
    QueueBufferOutput, SurfaceProducer,
};

use crate::parcel::Parcel;
use crate::protocol::Transaction;
use crate::transport::Transport;

/// Implements [`SurfaceProducer`] by sending every call over `T`.
pub struct ProducerProxy<T: Transport> {
    transport: T,
}

impl<T: Transport> ProducerProxy<T> {
    pub fn new(transport: T) -> Self {
        ProducerProxy { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn call<R>(
        &self,
        transaction: Transaction,
        write_args: impl FnOnce(&mut Parcel),
        read_payload: impl FnOnce(&mut Parcel) -> Result<R, ProducerError>,
    ) -> Result<R, ProducerError> {
        let mut data = Parcel::new();
        data.write_interface_token();
        write_args(&mut data);
        let mut reply = self.transport.transact(transaction.code(), &data)?;
        let payload = read_payload(&mut reply)?;
        let tail = reply.read_status()?;
        ProducerError::from_status(tail)?;
        Ok(payload)
    }
}

impl<T: Transport> SurfaceProducer for ProducerProxy<T> {
    fn request_buffer(&self, slot: i32) -> Result<Option<Arc<GraphicBuffer>>, ProducerError> {
        self.call(
            Transaction::RequestBuffer,
            |data| data.write_i32(slot),
            |reply| Ok(reply.read_graphic_buffer()?),
        )
    }

    fn set_buffer_count(&self, count: i32) -> Result<(), ProducerError> {
        self.call(Transaction::SetBufferCount, |data| data.write_i32(count), |_| Ok(()))
    }

    fn dequeue_buffer(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
    ) -> Result<DequeueResult, ProducerError> {
        self.call(
            Transaction::DequeueBuffer,
            |data| {
                data.write_u32(width);
                data.write_u32(height);
                data.write_u32(format.0);
                data.write_u32(usage.bits());
            },
            |reply| {
                Ok(DequeueResult {
                    slot: reply.read_i32()?,
                    needs_reallocation: reply.read_bool()?,
                })
            },
        )
    }

    fn queue_buffer(&self, slot: i32, input: QueueBufferInput) -> Result<QueueBufferOutput, ProducerError> {
        self.call(
            Transaction::QueueBuffer,
            |data| {
                data.write_i32(slot);
                data.write_queue_buffer_input(&input);
            },
            |reply| Ok(reply.read_queue_buffer_output()?),
        )
    }

    fn cancel_buffer(&self, slot: i32) -> Result<(), ProducerError> {
        self.call(Transaction::CancelBuffer, |data| data.write_i32(slot), |_| Ok(()))
    }

    fn query(&self, what: i32) -> Result<i32, ProducerError> {
        self.call(Transaction::Query, |data| data.write_i32(what), |reply| Ok(reply.read_i32()?))
    }

    fn set_synchronous_mode(&self, enabled: bool) -> Result<(), ProducerError> {
        self.call(Transaction::SetSynchronousMode, |data| data.write_bool(enabled), |_| Ok(()))
    }

    fn connect(&self, api: NativeWindowApi) -> Result<QueueBufferOutput, ProducerError> {
        self.call(
            Transaction::Connect,
            |data| data.write_i32(api.as_raw()),
            |reply| Ok(reply.read_queue_buffer_output()?),
        )
    }

    fn disconnect(&self, api: NativeWindowApi) -> Result<(), ProducerError> {
        self.call(Transaction::Disconnect, |data| data.write_i32(api.as_raw()), |_| Ok(()))
    }

    fn set_layout(&self, layout: u32) -> Result<(), ProducerError> {
        self.call(Transaction::SetLayout, |data| data.write_u32(layout), |_| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::ProducerStub;
    use crate::transport::LoopbackTransport;
    use flinger_core::config::BufferQueueConfig;
    use flinger_gui::{BufferQueue, Rect, TransportError};
    use pretty_assertions::assert_eq;

    fn loopback() -> (Arc<BufferQueue>, ProducerProxy<LoopbackTransport>) {
        let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
        let stub = Arc::new(ProducerStub::new(queue.clone()));
        (queue, ProducerProxy::new(LoopbackTransport::new(stub)))
    }

    #[test]
    fn test_dequeue_and_request_through_proxy() {
        let (queue, proxy) = loopback();
        let dequeued = proxy
            .dequeue_buffer(64, 48, PixelFormat::RGBA_8888, BufferUsage::HW_RENDER)
            .unwrap();
        assert!(dequeued.needs_reallocation);
        let remote = proxy.request_buffer(dequeued.slot).unwrap().unwrap();
        let local = queue.request_buffer(dequeued.slot).unwrap().unwrap();
        assert_eq!(*remote, *local);
    }

    #[test]
    fn test_errors_cross_the_wire() {
        let (_queue, proxy) = loopback();
        proxy.connect(NativeWindowApi::Egl).unwrap();
        assert_eq!(
            proxy.connect(NativeWindowApi::Camera),
            Err(ProducerError::AlreadyConnected(NativeWindowApi::Egl))
        );
        assert_eq!(
            proxy.disconnect(NativeWindowApi::Cpu),
            Err(ProducerError::InvalidApi(NativeWindowApi::Cpu))
        );
        assert_eq!(proxy.queue_buffer(40, QueueBufferInput::default()), Err(ProducerError::BadIndex(40)));
        assert_eq!(proxy.query(5), Err(ProducerError::UnknownQuery(5)));
    }

    #[test]
    fn test_queue_then_latch_through_proxy() {
        let (queue, proxy) = loopback();
        proxy.set_layout(0x0102_0000).unwrap();
        let slot = proxy
            .dequeue_buffer(0, 0, PixelFormat::UNSPECIFIED, BufferUsage::empty())
            .unwrap()
            .slot;
        let input = QueueBufferInput {
            crop: Rect::new(4, 4, 60, 40),
            timestamp: 16_666_667,
            ..QueueBufferInput::default()
        };
        proxy.queue_buffer(slot, input.clone()).unwrap();
        let frame = queue.latch().unwrap();
        assert_eq!(frame.input, input);
        assert_eq!(frame.layout, 0x0102_0000);
    }

    #[test]
    fn test_closed_transport_surfaces_as_transport_error() {
        let (_queue, proxy) = loopback();
        proxy.transport().close();
        assert_eq!(
            proxy.query(0),
            Err(ProducerError::Transport(TransportError::Disconnected))
        );
        assert_eq!(
            proxy.cancel_buffer(0),
            Err(ProducerError::Transport(TransportError::Disconnected))
        );
    }

    #[test]
    fn test_relay_keeps_transport_failures_distinct() {
        let (_queue, inner) = loopback();
        inner.transport().close();
        let relay = Arc::new(ProducerStub::new(Arc::new(inner)));
        let outer = ProducerProxy::new(LoopbackTransport::new(relay));
        assert_eq!(
            outer.connect(NativeWindowApi::Media),
            Err(ProducerError::Transport(TransportError::Disconnected))
        );
    }
}
