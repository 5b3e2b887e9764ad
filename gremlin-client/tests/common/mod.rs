//! Shared test support: an in-memory [`Transport`] that lets a test feed
//! pre-built response frames directly into a [`Connection`]'s reader task,
//! without a live Gremlin Server. Exercises spec.md §8's multiplexing and
//! failure scenarios (interleaved requests, mid-stream EOF, pool fairness)
//! the way the teacher's `tests/` integration suites exercise a running
//! `gazette::journal::Client` against a real broker, minus the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use gremlin_client::{Transport, TransporterFactory, TransportConfig, Uuid, Value, ValueMap};
use tokio::sync::{mpsc, Mutex};

/// One simulated inbound event: either a frame of response bytes, or a
/// clean EOF (the server closing the stream).
pub enum Inbound {
    Frame(Bytes),
    Eof,
}

pub struct MockTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    written: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                inbound: Mutex::new(rx),
                written: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            tx,
        )
    }

    pub async fn written_frames(&self) -> Vec<Bytes> {
        self.written.lock().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&self, frame: Bytes) -> gremlin_client::Result<()> {
        self.written.lock().await.push(frame);
        Ok(())
    }

    async fn read(&self) -> gremlin_client::Result<Option<Bytes>> {
        let mut rx = self.inbound.lock().await;
        match rx.recv().await {
            Some(Inbound::Frame(bytes)) => Ok(Some(bytes)),
            Some(Inbound::Eof) | None => Ok(None),
        }
    }

    async fn close(&self) -> gremlin_client::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A [`TransporterFactory`] that hands out fresh [`MockTransport`]s in
/// sequence, recording each one (and its inbound sender) so the test can
/// keep driving connections the pool opens on its own.
pub struct MockTransporterFactory {
    opened: Mutex<Vec<(Arc<MockTransport>, mpsc::UnboundedSender<Inbound>)>>,
}

impl MockTransporterFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
        })
    }

    pub async fn opened(&self) -> Vec<(Arc<MockTransport>, mpsc::UnboundedSender<Inbound>)> {
        self.opened.lock().await.clone()
    }
}

#[async_trait]
impl TransporterFactory for MockTransporterFactory {
    async fn connect(
        &self,
        _url: &str,
        _config: &TransportConfig,
    ) -> gremlin_client::Result<Arc<dyn Transport>> {
        let (transport, tx) = MockTransport::new();
        self.opened.lock().await.push((transport.clone(), tx));
        Ok(transport as Arc<dyn Transport>)
    }
}

/// Hand-encodes a response frame: `{version}{requestId}{status.code}
/// {status.message}{status.attributes}{result.data}{result.meta}`, the
/// inverse of [`gremlin_client::Response::decode`], for feeding canned
/// server replies into a [`MockTransport`].
pub fn encode_response(
    request_id: Uuid,
    status_code: i32,
    message: &str,
    data: Vec<Value>,
    meta: ValueMap,
) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(0x81);
    graphbinary::write_uuid_nfq(&mut buf, &request_id);
    graphbinary::write_value(&mut buf, &Value::Int32(status_code)).unwrap();
    graphbinary::write_string_nfq(&mut buf, message).unwrap();
    graphbinary::write_value(&mut buf, &Value::Map(Vec::new())).unwrap();
    graphbinary::write_value(&mut buf, &Value::List(data)).unwrap();
    graphbinary::write_value(&mut buf, &Value::Map(meta)).unwrap();
    buf.freeze()
}
