use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flinger_binder::{
    serve_connection, Parcel, ProducerPeer, ProducerProxy, ProducerServer, ProducerSocket, Transaction,
    Transport, UnixTransport,
};
use flinger_core::config::{BinderConfig, BufferQueueConfig};
use flinger_gui::{
    BufferQueue, BufferUsage, NativeWindowApi, PixelFormat, ProducerError, QueueBufferInput, Rect, ScalingMode,
    SlotState, SurfaceProducer, SyncFence, Transform, TransportError,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn spawn_pair(queue: Arc<BufferQueue>) -> (ProducerProxy<UnixTransport>, thread::JoinHandle<()>) {
    let (client, server) = UnixStream::pair().unwrap();
    let handle = thread::spawn(move || {
        let peer = ProducerPeer::from_stream(&server);
        serve_connection(server, &peer, &queue).unwrap();
    });
    (ProducerProxy::new(UnixTransport::from_stream(client)), handle)
}

#[test]
fn queue_then_latch_over_socket_preserves_input() {
    let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
    let (proxy, server) = spawn_pair(queue.clone());

    proxy.connect(NativeWindowApi::Egl).unwrap();
    let dequeued = proxy
        .dequeue_buffer(128, 72, PixelFormat::RGBA_8888, BufferUsage::HW_RENDER)
        .unwrap();
    let buffer = proxy.request_buffer(dequeued.slot).unwrap().unwrap();
    assert_eq!((buffer.width, buffer.height), (128, 72));

    let input = QueueBufferInput {
        crop: Rect::new(0, 0, 64, 72),
        transform: Transform::FLIP_H,
        scaling_mode: ScalingMode::ScaleToWindow,
        timestamp: 1_000_000_007,
        fence: Some(SyncFence(3)),
    };
    let output = proxy.queue_buffer(dequeued.slot, input.clone()).unwrap();
    assert_eq!(output.num_pending_buffers, 1);

    let frame = queue.latch().unwrap();
    assert_eq!(frame.input.crop, input.crop);
    assert_eq!(frame.input.transform, input.transform);
    assert_eq!(frame.input.timestamp, input.timestamp);
    assert_eq!(frame.input, input);

    drop(proxy);
    server.join().unwrap();
}

#[test]
fn protocol_errors_are_reported_not_transport_errors() {
    let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
    let (proxy, server) = spawn_pair(queue);

    proxy.connect(NativeWindowApi::Media).unwrap();
    assert_eq!(
        proxy.connect(NativeWindowApi::Cpu),
        Err(ProducerError::AlreadyConnected(NativeWindowApi::Media))
    );
    assert_eq!(proxy.request_buffer(-1), Err(ProducerError::BadIndex(-1)));
    assert_eq!(proxy.query(1234), Err(ProducerError::UnknownQuery(1234)));
    assert_eq!(proxy.cancel_buffer(2), Ok(()));

    let slot = proxy
        .dequeue_buffer(0, 0, PixelFormat::UNSPECIFIED, BufferUsage::empty())
        .unwrap()
        .slot;
    assert!(matches!(proxy.set_buffer_count(4), Err(ProducerError::InvalidOperation(_))));
    proxy.cancel_buffer(slot).unwrap();
    proxy.set_buffer_count(4).unwrap();
    assert_eq!(proxy.query(11), Ok(4));

    drop(proxy);
    server.join().unwrap();
}

#[test]
fn interface_token_mismatch_fails_the_call() {
    let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
    let (client, server_end) = UnixStream::pair().unwrap();
    let server = {
        let queue = queue.clone();
        thread::spawn(move || {
            let peer = ProducerPeer::from_stream(&server_end);
            serve_connection(server_end, &peer, &queue).unwrap();
        })
    };
    let transport = UnixTransport::from_stream(client);

    let mut data = Parcel::new();
    data.write_string("android.gui.ISurfaceComposer");
    data.write_i32(NativeWindowApi::Egl.as_raw());
    let result = transport.transact(Transaction::Connect.code(), &data);
    assert!(matches!(result, Err(TransportError::InterfaceMismatch { .. })));
    assert_eq!(queue.connected_api(), None);

    let mut data = Parcel::new();
    data.write_interface_token();
    assert_eq!(
        transport.transact(99, &data),
        Err(TransportError::UnknownTransaction(99))
    );

    drop(transport);
    server.join().unwrap();
}

#[test]
fn socket_close_reclaims_dequeued_slots() {
    let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
    let (proxy, server) = spawn_pair(queue.clone());

    proxy.connect(NativeWindowApi::Cpu).unwrap();
    let slot = proxy
        .dequeue_buffer(0, 0, PixelFormat::UNSPECIFIED, BufferUsage::empty())
        .unwrap()
        .slot;
    assert_eq!(queue.slot_state(slot), Some(SlotState::Dequeued));

    drop(proxy);
    server.join().unwrap();

    assert_eq!(queue.slot_state(slot), Some(SlotState::Free));
    assert_eq!(queue.connected_api(), None);
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let dir = tempdir().unwrap();
    let result = UnixTransport::connect(dir.path().join("nobody-home"));
    assert!(matches!(result, Err(TransportError::Io { .. })));

    let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
    let (client, server_end) = UnixStream::pair().unwrap();
    drop(server_end);
    let proxy = ProducerProxy::new(UnixTransport::from_stream(client));
    assert!(matches!(proxy.query(0), Err(ProducerError::Transport(_))));
    assert_eq!(queue.connected_api(), None);
}

#[test]
fn server_accepts_on_configured_socket() {
    let dir = tempdir().unwrap();
    let config = BinderConfig {
        socket_name: "surface-texture-test".to_string(),
        runtime_dir: Some(dir.path().to_path_buf()),
    };
    let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
    let server = ProducerServer::new(ProducerSocket::bind(&config).unwrap(), queue.clone());
    let path = server.path().to_path_buf();
    let handle = thread::spawn(move || server.serve_next().unwrap());

    let proxy = ProducerProxy::new(UnixTransport::connect(&path).unwrap());
    proxy.connect(NativeWindowApi::Egl).unwrap();
    proxy.set_layout(0x0001_0000).unwrap();
    assert_eq!(queue.connected_api(), Some(NativeWindowApi::Egl));

    drop(proxy);
    handle.join().unwrap();
    assert_eq!(queue.connected_api(), None);
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn departing_peer_leaves_connected_producer_alone() {
    let dir = tempdir().unwrap();
    let config = BinderConfig {
        socket_name: "surface-two-peers".to_string(),
        runtime_dir: Some(dir.path().to_path_buf()),
    };
    let queue = Arc::new(BufferQueue::new(&BufferQueueConfig::default()));
    let server = ProducerServer::new(ProducerSocket::bind(&config).unwrap(), queue.clone());
    let path = server.path().to_path_buf();
    thread::spawn(move || server.run());

    let producer = ProducerProxy::new(UnixTransport::connect(&path).unwrap());
    producer.connect(NativeWindowApi::Egl).unwrap();
    let slot = producer
        .dequeue_buffer(0, 0, PixelFormat::UNSPECIFIED, BufferUsage::empty())
        .unwrap()
        .slot;

    let bystander = ProducerProxy::new(UnixTransport::connect(&path).unwrap());
    assert!(matches!(
        bystander.connect(NativeWindowApi::Cpu),
        Err(ProducerError::AlreadyConnected(NativeWindowApi::Egl))
    ));
    let borrowed = bystander
        .dequeue_buffer(0, 0, PixelFormat::UNSPECIFIED, BufferUsage::empty())
        .unwrap()
        .slot;
    assert_ne!(borrowed, slot);
    drop(bystander);

    wait_until("the bystander's slot to be returned", || {
        queue.slot_state(borrowed) == Some(SlotState::Free)
    });
    assert_eq!(queue.connected_api(), Some(NativeWindowApi::Egl));
    assert_eq!(queue.slot_state(slot), Some(SlotState::Dequeued));
    producer.queue_buffer(slot, QueueBufferInput::default()).unwrap();
    assert_eq!(queue.latch().map(|frame| frame.slot), Some(slot));

    drop(producer);
    wait_until("the producer to be disconnected", || queue.connected_api().is_none());
}
