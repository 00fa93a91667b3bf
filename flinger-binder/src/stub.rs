//! Server-side adapter: decodes requests and calls any [`SurfaceProducer`].

use std::sync::Arc;
use tracing::{debug, warn};

use flinger_gui::{
    BufferUsage, DequeueResult, NativeWindowApi, PixelFormat, ProducerError, QueueBufferOutput, StatusTail,
    SurfaceProducer, TransportError,
};

use crate::parcel::Parcel;
use crate::protocol::Transaction;

/// Appends the status tail for `result` to `reply`.
fn finish<T>(reply: &mut Parcel, result: &Result<T, ProducerError>) {
    let tail = match result {
        Ok(_) => StatusTail::ok(),
        Err(err) => err.to_status(),
    };
    reply.write_status(&tail);
}

pub struct ProducerStub {
    producer: Arc<dyn SurfaceProducer>,
}

impl ProducerStub {
    pub fn new(producer: Arc<dyn SurfaceProducer>) -> Self {
        ProducerStub { producer }
    }

    /// Serves one transaction.
    ///
    /// Producer failures travel inside the reply's status tail. An `Err` here
    /// means the request itself was unusable (unknown code, wrong interface
    /// token, truncated payload) and the producer was not called.
    pub fn on_transact(&self, code: u32, data: &mut Parcel) -> Result<Parcel, TransportError> {
        let transaction = Transaction::try_from(code)?;
        data.enforce_interface()?;
        debug!("Dispatching {:?}", transaction);

        let mut reply = Parcel::new();
        match transaction {
            Transaction::RequestBuffer => {
                let slot = data.read_i32()?;
                let result = self.producer.request_buffer(slot);
                let buffer = result.as_ref().ok().and_then(|b| b.as_deref());
                reply.write_graphic_buffer(buffer);
                finish(&mut reply, &result);
            }
            Transaction::SetBufferCount => {
                let count = data.read_i32()?;
                finish(&mut reply, &self.producer.set_buffer_count(count));
            }
            Transaction::DequeueBuffer => {
                let width = data.read_u32()?;
                let height = data.read_u32()?;
                let format = PixelFormat(data.read_u32()?);
                let usage = BufferUsage::from_bits_retain(data.read_u32()?);
                let result = self.producer.dequeue_buffer(width, height, format, usage);
                let dequeued = result.as_ref().ok().copied().unwrap_or(DequeueResult {
                    slot: -1,
                    needs_reallocation: false,
                });
                reply.write_i32(dequeued.slot);
                reply.write_bool(dequeued.needs_reallocation);
                finish(&mut reply, &result);
            }
            Transaction::QueueBuffer => {
                let slot = data.read_i32()?;
                let input = data.read_queue_buffer_input()?;
                let result = self.producer.queue_buffer(slot, input);
                reply.write_queue_buffer_output(&result.as_ref().ok().copied().unwrap_or_default());
                finish(&mut reply, &result);
            }
            Transaction::CancelBuffer => {
                let slot = data.read_i32()?;
                finish(&mut reply, &self.producer.cancel_buffer(slot));
            }
            Transaction::Query => {
                let what = data.read_i32()?;
                let result = self.producer.query(what);
                reply.write_i32(*result.as_ref().unwrap_or(&0));
                finish(&mut reply, &result);
            }
            Transaction::SetSynchronousMode => {
                let enabled = data.read_bool()?;
                finish(&mut reply, &self.producer.set_synchronous_mode(enabled));
            }
            Transaction::Connect => {
                let result = NativeWindowApi::try_from(data.read_i32()?).and_then(|api| self.producer.connect(api));
                reply.write_queue_buffer_output(&result.as_ref().ok().copied().unwrap_or(QueueBufferOutput::default()));
                finish(&mut reply, &result);
            }
            Transaction::Disconnect => {
                let result = NativeWindowApi::try_from(data.read_i32()?).and_then(|api| self.producer.disconnect(api));
                finish(&mut reply, &result);
            }
            Transaction::SetLayout => {
                let layout = data.read_u32()?;
                finish(&mut reply, &self.producer.set_layout(layout));
            }
        }

        if data.remaining() != 0 {
            warn!("{:?}: {} trailing request bytes ignored", transaction, data.remaining());
        }
        Ok(reply)
    }
}
