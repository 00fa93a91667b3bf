//! Transaction codes, the interface token and the wire shapes of the
//! producer contract's value types.

use std::sync::Arc;

use flinger_gui::{
    BufferId, BufferUsage, GraphicBuffer, PixelFormat, QueueBufferInput, QueueBufferOutput, Rect, ScalingMode,
    StatusTail, SyncFence, Transform, TransportError,
};

use crate::parcel::Parcel;

/// Written at the start of every request.
pub const INTERFACE_TOKEN: &str = "android.gui.SurfaceTexture";

/// First code available to user transactions.
pub const FIRST_CALL_TRANSACTION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transaction {
    RequestBuffer = FIRST_CALL_TRANSACTION as isize,
    SetBufferCount,
    DequeueBuffer,
    QueueBuffer,
    CancelBuffer,
    Query,
    SetSynchronousMode,
    Connect,
    Disconnect,
    SetLayout,
}

impl Transaction {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Transaction {
    type Error = TransportError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        let transaction = match code {
            1 => Transaction::RequestBuffer,
            2 => Transaction::SetBufferCount,
            3 => Transaction::DequeueBuffer,
            4 => Transaction::QueueBuffer,
            5 => Transaction::CancelBuffer,
            6 => Transaction::Query,
            7 => Transaction::SetSynchronousMode,
            8 => Transaction::Connect,
            9 => Transaction::Disconnect,
            10 => Transaction::SetLayout,
            other => return Err(TransportError::UnknownTransaction(other)),
        };
        Ok(transaction)
    }
}

/// Frame code of a reply. Anything but [`REPLY_OK`] means the call never
/// reached the producer.
pub const REPLY_OK: u32 = 0;
pub const REPLY_UNKNOWN_TRANSACTION: u32 = 1;
pub const REPLY_BAD_INTERFACE: u32 = 2;
pub const REPLY_MALFORMED: u32 = 3;

/// Encodes a failed dispatch as a reply frame `(code, payload)`.
pub fn encode_transport_failure(err: &TransportError) -> (u32, Parcel) {
    let mut payload = Parcel::new();
    let code = match err {
        TransportError::UnknownTransaction(code) => {
            payload.write_u32(*code);
            REPLY_UNKNOWN_TRANSACTION
        }
        TransportError::InterfaceMismatch { actual, .. } => {
            payload.write_string(actual);
            REPLY_BAD_INTERFACE
        }
        other => {
            payload.write_string(&other.to_string());
            REPLY_MALFORMED
        }
    };
    (code, payload)
}

/// Turns a reply frame back into the reply parcel or the dispatch failure.
pub fn decode_reply(code: u32, payload: Vec<u8>) -> Result<Parcel, TransportError> {
    let mut parcel = Parcel::from_bytes(payload);
    match code {
        REPLY_OK => Ok(parcel),
        REPLY_UNKNOWN_TRANSACTION => Err(TransportError::UnknownTransaction(parcel.read_u32()?)),
        REPLY_BAD_INTERFACE => Err(TransportError::InterfaceMismatch {
            expected: INTERFACE_TOKEN.to_string(),
            actual: parcel.read_string()?,
        }),
        REPLY_MALFORMED => Err(TransportError::Malformed(parcel.read_string()?)),
        other => Err(TransportError::Malformed(format!("unknown reply code {}", other))),
    }
}

impl Parcel {
    pub fn write_interface_token(&mut self) {
        self.write_string(INTERFACE_TOKEN);
    }

    /// Reads the token and fails the whole call on mismatch.
    pub fn enforce_interface(&mut self) -> Result<(), TransportError> {
        let actual = self.read_string()?;
        if actual != INTERFACE_TOKEN {
            return Err(TransportError::InterfaceMismatch {
                expected: INTERFACE_TOKEN.to_string(),
                actual,
            });
        }
        Ok(())
    }

    pub fn write_status(&mut self, tail: &StatusTail) {
        self.write_i32(tail.status);
        self.write_i32(tail.detail);
        self.write_string(&tail.message);
    }

    pub fn read_status(&mut self) -> Result<StatusTail, TransportError> {
        Ok(StatusTail {
            status: self.read_i32()?,
            detail: self.read_i32()?,
            message: self.read_string()?,
        })
    }

    pub fn write_rect(&mut self, rect: &Rect) {
        self.write_i32(rect.left);
        self.write_i32(rect.top);
        self.write_i32(rect.right);
        self.write_i32(rect.bottom);
    }

    pub fn read_rect(&mut self) -> Result<Rect, TransportError> {
        Ok(Rect {
            left: self.read_i32()?,
            top: self.read_i32()?,
            right: self.read_i32()?,
            bottom: self.read_i32()?,
        })
    }

    pub fn write_queue_buffer_input(&mut self, input: &QueueBufferInput) {
        self.write_rect(&input.crop);
        self.write_u32(input.transform.bits());
        self.write_i32(input.scaling_mode as i32);
        self.write_i64(input.timestamp);
        self.write_bool(input.fence.is_some());
        self.write_u64(input.fence.map_or(0, |fence| fence.0));
    }

    pub fn read_queue_buffer_input(&mut self) -> Result<QueueBufferInput, TransportError> {
        let crop = self.read_rect()?;
        let transform = Transform::from_bits(self.read_u32()?)
            .ok_or_else(|| TransportError::Malformed("unknown transform bits".to_string()))?;
        let scaling_mode = ScalingMode::try_from(self.read_i32()?)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        let timestamp = self.read_i64()?;
        let has_fence = self.read_bool()?;
        let fence_id = self.read_u64()?;
        Ok(QueueBufferInput {
            crop,
            transform,
            scaling_mode,
            timestamp,
            fence: has_fence.then_some(SyncFence(fence_id)),
        })
    }

    pub fn write_queue_buffer_output(&mut self, output: &QueueBufferOutput) {
        self.write_u32(output.width);
        self.write_u32(output.height);
        self.write_u32(output.transform_hint);
        self.write_u32(output.num_pending_buffers);
    }

    pub fn read_queue_buffer_output(&mut self) -> Result<QueueBufferOutput, TransportError> {
        Ok(QueueBufferOutput {
            width: self.read_u32()?,
            height: self.read_u32()?,
            transform_hint: self.read_u32()?,
            num_pending_buffers: self.read_u32()?,
        })
    }

    /// Writes a non-null flag followed by the buffer description.
    pub fn write_graphic_buffer(&mut self, buffer: Option<&GraphicBuffer>) {
        self.write_bool(buffer.is_some());
        if let Some(buffer) = buffer {
            self.write_u64(buffer.id.as_raw());
            self.write_u32(buffer.width);
            self.write_u32(buffer.height);
            self.write_u32(buffer.stride);
            self.write_u32(buffer.format.0);
            self.write_u32(buffer.usage.bits());
        }
    }

    pub fn read_graphic_buffer(&mut self) -> Result<Option<Arc<GraphicBuffer>>, TransportError> {
        if !self.read_bool()? {
            return Ok(None);
        }
        Ok(Some(Arc::new(GraphicBuffer {
            id: BufferId::from_raw(self.read_u64()?),
            width: self.read_u32()?,
            height: self.read_u32()?,
            stride: self.read_u32()?,
            format: PixelFormat(self.read_u32()?),
            usage: BufferUsage::from_bits_retain(self.read_u32()?),
        })))
    }
}
