use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error};
use waterfall_proto::Rgb;

use crate::command::{Command, Dispatcher};
use crate::config::StreamConfig;
use crate::event::ClientEvent;
use crate::transport::{Connector, WebSocketConnector};
use crate::worker::Worker;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to start stream worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Cloneable, submit-only view of a session.
///
/// Every method returns as soon as the command is queued. Handles that outlive
/// their [`StreamClient`] keep compiling and silently do nothing.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    dispatcher: Dispatcher,
}

impl StreamHandle {
    pub fn open(&self, url: &str) {
        self.dispatcher.submit(Command::Open {
            url: url.to_string(),
        });
    }

    pub fn send_init(&self, callsign: &str, mode: &str, width: u32, height: u32) {
        self.dispatcher.submit(Command::Init {
            callsign: callsign.to_string(),
            mode: mode.to_string(),
            width,
            height,
        });
    }

    /// Queues one image row. `pixels` is copied before this returns.
    pub fn send_row<P>(&self, y: u32, pixels: &[P])
    where
        P: Copy + Into<Rgb>,
    {
        let pixels = pixels.iter().map(|&pixel| pixel.into()).collect();
        self.dispatcher.submit(Command::Row { y, pixels });
    }
}

/// Streams waterfall rows to a visualization endpoint from any thread.
///
/// All socket I/O runs on a dedicated worker thread. Dropping the client (or
/// calling [`StreamClient::shutdown`]) stops the worker, closes the socket and
/// discards any commands still queued.
pub struct StreamClient {
    handle: StreamHandle,
    events: broadcast::Sender<ClientEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl StreamClient {
    /// Starts a client that speaks WebSocket with default settings.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_connector(StreamConfig::default(), WebSocketConnector)
    }

    pub fn with_config(config: StreamConfig) -> Result<Self, ClientError> {
        Self::with_connector(config, WebSocketConnector)
    }

    pub fn with_connector<C>(config: StreamConfig, connector: C) -> Result<Self, ClientError>
    where
        C: Connector + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (dispatcher, commands) = Dispatcher::new();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker_name = config.worker_name.clone();
        let worker = Worker::new(
            Arc::new(connector),
            config,
            commands,
            shutdown_rx,
            events.clone(),
        );
        let join = thread::Builder::new()
            .name(worker_name)
            .spawn(move || runtime.block_on(worker.run()))?;

        Ok(Self {
            handle: StreamHandle { dispatcher },
            events,
            shutdown: Some(shutdown_tx),
            worker: Some(join),
        })
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    /// Receives lifecycle events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn open(&self, url: &str) {
        self.handle.open(url);
    }

    pub fn send_init(&self, callsign: &str, mode: &str, width: u32, height: u32) {
        self.handle.send_init(callsign, mode, width, height);
    }

    pub fn send_row<P>(&self, y: u32, pixels: &[P])
    where
        P: Copy + Into<Rgb>,
    {
        self.handle.send_row(y, pixels);
    }

    /// Stops the worker and waits for it to release the socket.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(target: "waterfall.client", "stream worker panicked");
            } else {
                debug!(target: "waterfall.client", "stream worker joined");
            }
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
