//! In-memory transport with a scripted remote end.
//!
//! [`MockConnector`] is handed to the client; the paired [`MockRemote`] stays with
//! the test and decides when connects succeed, injects disconnects and errors, and
//! reports everything the worker did to the socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, Notify};

use super::{Connector, Socket, SocketEvent, TransportError, TransportResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockActivity {
    Connect(String),
    Frame(String),
    Close,
}

struct Shared {
    activity: mpsc::UnboundedSender<MockActivity>,
    pending: Mutex<VecDeque<oneshot::Sender<Result<(), String>>>>,
    socket_events: Mutex<Option<mpsc::UnboundedSender<SocketEvent>>>,
    hold_sends: AtomicBool,
    close_next_send: AtomicBool,
    release: Notify,
}

impl Shared {
    fn record(&self, activity: MockActivity) {
        let _ = self.activity.send(activity);
    }
}

#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

pub struct MockRemote {
    shared: Arc<Shared>,
    activity: mpsc::UnboundedReceiver<MockActivity>,
}

pub fn mock_pair() -> (MockConnector, MockRemote) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        activity: tx,
        pending: Mutex::new(VecDeque::new()),
        socket_events: Mutex::new(None),
        hold_sends: AtomicBool::new(false),
        close_next_send: AtomicBool::new(false),
        release: Notify::new(),
    });
    (
        MockConnector {
            shared: Arc::clone(&shared),
        },
        MockRemote {
            shared,
            activity: rx,
        },
    )
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> TransportResult<Box<dyn Socket>> {
        let (decide_tx, decide_rx) = oneshot::channel();
        self.shared.pending.lock().push_back(decide_tx);
        self.shared.record(MockActivity::Connect(url.to_string()));

        match decide_rx.await {
            Ok(Ok(())) => {
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                *self.shared.socket_events.lock() = Some(events_tx);
                Ok(Box::new(MockSocket {
                    shared: Arc::clone(&self.shared),
                    events: events_rx,
                }))
            }
            Ok(Err(reason)) => Err(TransportError::Other(reason)),
            Err(_) => Err(TransportError::Closed),
        }
    }
}

struct MockSocket {
    shared: Arc<Shared>,
    events: mpsc::UnboundedReceiver<SocketEvent>,
}

#[async_trait]
impl Socket for MockSocket {
    async fn send_text(&mut self, text: String) -> TransportResult<()> {
        if self.shared.close_next_send.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.shared.record(MockActivity::Frame(text));
        if self.shared.hold_sends.load(Ordering::SeqCst) {
            self.shared.release.notified().await;
        }
        Ok(())
    }

    async fn next_event(&mut self) -> SocketEvent {
        self.events.recv().await.unwrap_or(SocketEvent::Disconnected)
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.shared.record(MockActivity::Close);
        Ok(())
    }
}

impl MockRemote {
    /// Completes the oldest pending connect. Returns `false` if none is waiting.
    pub fn accept(&self) -> bool {
        self.decide(Ok(()))
    }

    pub fn refuse(&self, reason: &str) -> bool {
        self.decide(Err(reason.to_string()))
    }

    fn decide(&self, outcome: Result<(), String>) -> bool {
        match self.shared.pending.lock().pop_front() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    pub fn disconnect(&self) -> bool {
        self.inject(SocketEvent::Disconnected)
    }

    pub fn fail(&self, reason: &str) -> bool {
        self.inject(SocketEvent::Error(TransportError::Other(reason.to_string())))
    }

    fn inject(&self, event: SocketEvent) -> bool {
        match self.shared.socket_events.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Makes every subsequent `send_text` park until [`MockRemote::release_send`].
    pub fn hold_sends(&self) {
        self.shared.hold_sends.store(true, Ordering::SeqCst);
    }

    /// Lets one parked `send_text` complete.
    pub fn release_send(&self) {
        self.shared.release.notify_one();
    }

    /// The next `send_text` finds the peer already gone, as if its close frame
    /// arrived while the write was being issued.
    pub fn close_on_next_send(&self) {
        self.shared.close_next_send.store(true, Ordering::SeqCst);
    }

    pub async fn next_activity(&mut self, timeout: Duration) -> Option<MockActivity> {
        tokio::time::timeout(timeout, self.activity.recv())
            .await
            .ok()
            .flatten()
    }

    /// Returns everything recorded so far without waiting.
    pub fn drain(&mut self) -> Vec<MockActivity> {
        let mut seen = Vec::new();
        while let Ok(activity) = self.activity.try_recv() {
            seen.push(activity);
        }
        seen
    }
}
