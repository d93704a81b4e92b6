//! In-memory platform used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

use btserial::bluetooth::{
    AdapterHandle, ConnectTarget, DeviceDescriptor, DiscoveryService, DiscoverySink, Platform,
    RfcommSocket, SocketFactory, Transport,
};
use btserial::{AdapterStatus, BluetoothConnection, LinkConfig};

pub fn device(n: u8) -> DeviceDescriptor {
    DeviceDescriptor::new(format!("00:11:22:33:44:{:02X}", n), format!("HC-0{}", n))
}

#[derive(Default)]
pub struct MockAdapter {
    pub enabled: AtomicBool,
    pub fail_power: AtomicBool,
    pub bonded: Mutex<Vec<DeviceDescriptor>>,
    pub calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl AdapterHandle for MockAdapter {
    async fn is_enabled(&self) -> anyhow::Result<bool> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    async fn enable(&self) -> anyhow::Result<()> {
        self.calls.lock().push("enable");
        if self.fail_power.load(Ordering::SeqCst) {
            anyhow::bail!("rfkill");
        }
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disable(&self) -> anyhow::Result<()> {
        self.calls.lock().push("disable");
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn bonded_devices(&self) -> anyhow::Result<Vec<DeviceDescriptor>> {
        Ok(self.bonded.lock().clone())
    }
}

#[derive(Default)]
pub struct MockDiscovery {
    sink: Mutex<Option<DiscoverySink>>,
    pub discovering: AtomicBool,
    pub starts: AtomicUsize,
    pub cancels: AtomicUsize,
}

impl MockDiscovery {
    /// Deliver a device-found event through the last registered sink.
    pub fn found(&self, device: DeviceDescriptor) {
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.device_found(device);
        }
    }

    /// End the scan from the platform side.
    pub fn finish(&self) {
        self.discovering.store(false, Ordering::SeqCst);
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.finished();
        }
    }
}

#[async_trait]
impl DiscoveryService for MockDiscovery {
    async fn start_discovery(&self, sink: DiscoverySink) -> anyhow::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.discovering.store(true, Ordering::SeqCst);
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    async fn cancel_discovery(&self) -> anyhow::Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.discovering.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }
}

/// What a socket created for one target will do.
pub enum SocketBehavior {
    FailConnect,
    Connect(Box<dyn Transport>),
}

#[derive(Default)]
pub struct MockSockets {
    pub service: Mutex<Option<SocketBehavior>>,
    pub channel: Mutex<Option<SocketBehavior>>,
    pub created: Mutex<Vec<ConnectTarget>>,
    pub closes: Arc<AtomicUsize>,
}

impl MockSockets {
    pub fn on_service(&self, behavior: SocketBehavior) {
        *self.service.lock() = Some(behavior);
    }

    pub fn on_channel(&self, behavior: SocketBehavior) {
        *self.channel.lock() = Some(behavior);
    }
}

#[async_trait]
impl SocketFactory for MockSockets {
    async fn create_socket(
        &self,
        _device: &DeviceDescriptor,
        target: ConnectTarget,
    ) -> io::Result<Box<dyn RfcommSocket>> {
        self.created.lock().push(target);
        let behavior = match target {
            ConnectTarget::ServiceRecord(_) => self.service.lock().take(),
            ConnectTarget::Channel(_) => self.channel.lock().take(),
        };
        let transport = match behavior {
            Some(SocketBehavior::Connect(transport)) => Some(transport),
            Some(SocketBehavior::FailConnect) | None => None,
        };
        Ok(Box::new(MockSocket {
            transport,
            closes: self.closes.clone(),
        }))
    }
}

struct MockSocket {
    transport: Option<Box<dyn Transport>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl RfcommSocket for MockSocket {
    async fn connect(&mut self) -> io::Result<()> {
        if self.transport.is_some() {
            Ok(())
        } else {
            Err(io::ErrorKind::ConnectionRefused.into())
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.transport = None;
        Err(io::ErrorKind::Other.into())
    }

    fn into_transport(self: Box<Self>) -> io::Result<Box<dyn Transport>> {
        self.transport
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

/// One scripted read result.
pub enum Read {
    Data(&'static [u8]),
    Fail(io::ErrorKind),
}

/// Observes a [`ScriptedTransport`] after it has been handed over.
#[derive(Clone, Default)]
pub struct TransportProbe {
    pub written: Arc<Mutex<Vec<u8>>>,
    pub released: Arc<AtomicBool>,
}

/// Transport that replays reads and records writes.
///
/// Once the script is exhausted reads stay pending.
pub struct ScriptedTransport {
    reads: VecDeque<Read>,
    fail_writes: bool,
    probe: TransportProbe,
}

impl ScriptedTransport {
    pub fn new(reads: Vec<Read>) -> (Self, TransportProbe) {
        let probe = TransportProbe::default();
        let transport = Self {
            reads: reads.into(),
            fail_writes: false,
            probe: probe.clone(),
        };
        (transport, probe)
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

impl AsyncRead for ScriptedTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.reads.pop_front() {
            Some(Read::Data(bytes)) => {
                buf.put_slice(bytes);
                Poll::Ready(Ok(()))
            }
            Some(Read::Fail(kind)) => Poll::Ready(Err(kind.into())),
            None => Poll::Pending,
        }
    }
}

impl AsyncWrite for ScriptedTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        self.probe.written.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.probe.released.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

pub struct Harness {
    pub conn: BluetoothConnection,
    pub adapter: Arc<MockAdapter>,
    pub discovery: Arc<MockDiscovery>,
    pub sockets: Arc<MockSockets>,
    pub states: mpsc::UnboundedReceiver<AdapterStatus>,
    pub devices: mpsc::UnboundedReceiver<Vec<DeviceDescriptor>>,
    pub data: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    pub async fn new(enabled: bool, config: LinkConfig) -> Self {
        let adapter = Arc::new(MockAdapter::default());
        adapter.enabled.store(enabled, Ordering::SeqCst);
        let discovery = Arc::new(MockDiscovery::default());
        let sockets = Arc::new(MockSockets::default());

        let platform = Platform::new(adapter.clone(), discovery.clone(), sockets.clone());
        let conn = BluetoothConnection::new(Some(platform), config).await;
        Self::observe(conn, adapter, discovery, sockets)
    }

    pub async fn unsupported() -> Self {
        let conn = BluetoothConnection::new(None, LinkConfig::default()).await;
        Self::observe(conn, Arc::default(), Arc::default(), Arc::default())
    }

    fn observe(
        mut conn: BluetoothConnection,
        adapter: Arc<MockAdapter>,
        discovery: Arc<MockDiscovery>,
        sockets: Arc<MockSockets>,
    ) -> Self {
        let (state_tx, states) = mpsc::unbounded_channel();
        let (device_tx, devices) = mpsc::unbounded_channel();
        let (data_tx, data) = mpsc::unbounded_channel();
        conn.set_state_observer(state_tx);
        conn.set_device_list_observer(device_tx);
        conn.set_data_observer(data_tx);

        Self {
            conn,
            adapter,
            discovery,
            sockets,
            states,
            devices,
            data,
        }
    }

    /// Apply the next background event, failing the test if none arrives.
    pub async fn process(&mut self) {
        tokio::time::timeout(Duration::from_secs(2), self.conn.process_next())
            .await
            .expect("no background event arrived");
    }

    /// Connect to `device(1)` and apply the attempt outcome.
    pub async fn connect_with(&mut self, transport: impl Transport + 'static) {
        self.sockets.on_service(SocketBehavior::Connect(Box::new(transport)));
        self.conn.connect(device(1)).await.unwrap();
        self.process().await;
        assert_eq!(self.conn.status(), AdapterStatus::Connected);
        drain(&mut self.states);
    }
}

pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
