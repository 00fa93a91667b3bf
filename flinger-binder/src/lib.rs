//! Carries the [`SurfaceProducer`](flinger_gui::SurfaceProducer) contract
//! between processes.
//!
//! A producer holds a [`ProducerProxy`] over a [`Transport`]; the compositor
//! runs a [`ProducerServer`] that feeds each request to a [`ProducerStub`]
//! wrapping a per-connection [`ProducerSession`] over its
//! [`BufferQueue`](flinger_gui::BufferQueue).
//!
//! Requests and replies are [`Parcel`]s framed as
//! `u32 code | u32 length | payload`, little endian. Every request starts
//! with [`INTERFACE_TOKEN`]; every reply ends with a status tail.

pub mod error;
pub mod parcel;
pub mod protocol;
pub mod proxy;
pub mod server;
pub mod session;
pub mod stub;
pub mod transport;

pub use error::BinderError;
pub use parcel::Parcel;
pub use protocol::{Transaction, INTERFACE_TOKEN};
pub use proxy::ProducerProxy;
pub use server::{serve_connection, ProducerPeer, ProducerServer, ProducerSocket};
pub use session::ProducerSession;
pub use stub::ProducerStub;
pub use transport::{LoopbackTransport, Transport, UnixTransport};
