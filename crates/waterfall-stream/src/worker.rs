use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, trace, warn};
use waterfall_proto::{encode_init, encode_row};

use crate::command::{Command, CommandReceiver};
use crate::config::StreamConfig;
use crate::event::ClientEvent;
use crate::state::{ConnectionState, Transition};
use crate::transport::{Connector, Socket, SocketEvent, TransportError, TransportResult};

type ConnectFuture = Pin<Box<dyn Future<Output = TransportResult<Box<dyn Socket>>> + Send>>;

enum Input {
    Shutdown,
    Command(Command),
    Socket(SocketEvent),
    Connected(TransportResult<Box<dyn Socket>>),
}

enum Flow {
    Continue,
    Stop,
}

/// Sole owner of the session's socket and connection state.
///
/// Commands, connect completion and socket callbacks are all handled one at a
/// time from [`Worker::run`], so state changes and writes are totally ordered.
pub(crate) struct Worker {
    connector: Arc<dyn Connector>,
    config: StreamConfig,
    commands: CommandReceiver,
    shutdown: oneshot::Receiver<()>,
    events: broadcast::Sender<ClientEvent>,
    state: ConnectionState,
    url: Option<String>,
    connecting: Option<ConnectFuture>,
    socket: Option<Box<dyn Socket>>,
}

impl Worker {
    pub(crate) fn new(
        connector: Arc<dyn Connector>,
        config: StreamConfig,
        commands: CommandReceiver,
        shutdown: oneshot::Receiver<()>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            connector,
            config,
            commands,
            shutdown,
            events,
            state: ConnectionState::Idle,
            url: None,
            connecting: None,
            socket: None,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(target: "waterfall.worker", "worker started");
        loop {
            let flow = match self.next_input().await {
                Input::Shutdown => Flow::Stop,
                Input::Command(command) => self.handle_command(command).await,
                Input::Socket(event) => {
                    self.handle_socket_event(event);
                    Flow::Continue
                }
                Input::Connected(result) => {
                    self.handle_connected(result);
                    Flow::Continue
                }
            };
            if let Flow::Stop = flow {
                break;
            }
        }
        self.finish().await;
    }

    async fn next_input(&mut self) -> Input {
        let Self {
            commands,
            shutdown,
            connecting,
            socket,
            ..
        } = self;

        let socket_event = async {
            match socket.as_mut() {
                Some(socket) => socket.next_event().await,
                None => future::pending().await,
            }
        };
        let connected = async {
            match connecting.as_mut() {
                Some(connect) => connect.await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = shutdown => Input::Shutdown,
            event = socket_event => Input::Socket(event),
            result = connected => Input::Connected(result),
            command = commands.recv() => match command {
                Some(command) => Input::Command(command),
                None => Input::Shutdown,
            },
        }
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Open { url } => {
                self.start_connect(url);
                Flow::Continue
            }
            Command::Init {
                callsign,
                mode,
                width,
                height,
            } => {
                if !self.state.accepts_frames() {
                    trace!(target: "waterfall.worker", state = %self.state, "dropping init; not open");
                    return Flow::Continue;
                }
                match encode_init(&callsign, &mode, width, height) {
                    Ok(text) => self.write_frame(text).await,
                    Err(err) => {
                        self.fail(format!("encode init: {err}")).await;
                        Flow::Continue
                    }
                }
            }
            Command::Row { y, pixels } => {
                if !self.state.accepts_frames() {
                    trace!(target: "waterfall.worker", state = %self.state, y, "dropping row; not open");
                    return Flow::Continue;
                }
                match encode_row(y, &pixels) {
                    Ok(text) => self.write_frame(text).await,
                    Err(err) => {
                        self.fail(format!("encode row {y}: {err}")).await;
                        Flow::Continue
                    }
                }
            }
        }
    }

    fn start_connect(&mut self, url: String) {
        if !self.state.accepts_open() {
            debug!(
                target: "waterfall.worker",
                state = %self.state,
                url = %url,
                "open ignored; session already live"
            );
            return;
        }
        if !self.transition(Transition::Open) {
            return;
        }

        info!(target: "waterfall.worker", url = %url, "connecting");
        let connector = Arc::clone(&self.connector);
        let timeout = self.config.connect_timeout;
        let target = url.clone();
        let connect: ConnectFuture = Box::pin(async move {
            let attempt = tokio::time::timeout(timeout, connector.connect(&target)).await;
            match attempt {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    url: target,
                    timeout,
                }),
            }
        });
        self.connecting = Some(connect);
        self.url = Some(url);
    }

    fn handle_connected(&mut self, result: TransportResult<Box<dyn Socket>>) {
        self.connecting = None;
        match result {
            Ok(socket) => {
                if self.transition(Transition::Connected) {
                    info!(
                        target: "waterfall.worker",
                        url = self.url.as_deref().unwrap_or_default(),
                        "connected"
                    );
                    self.socket = Some(socket);
                    self.emit(ClientEvent::Connected);
                }
            }
            Err(err) => {
                warn!(
                    target: "waterfall.worker",
                    url = self.url.as_deref().unwrap_or_default(),
                    error = %err,
                    "connect failed"
                );
                if self.transition(Transition::Error) {
                    self.emit(ClientEvent::Error(err.to_string()));
                }
            }
        }
    }

    fn handle_socket_event(&mut self, event: SocketEvent) {
        // The socket is gone either way; a fresh Open starts over.
        self.socket = None;
        match event {
            SocketEvent::Disconnected => {
                info!(target: "waterfall.worker", "disconnected");
                if self.transition(Transition::Disconnected) {
                    self.emit(ClientEvent::Disconnected);
                }
            }
            SocketEvent::Error(err) => {
                warn!(target: "waterfall.worker", error = %err, "transport error");
                if self.transition(Transition::Error) {
                    self.emit(ClientEvent::Error(err.to_string()));
                }
            }
        }
    }

    /// Writes one text frame. A shutdown request abandons a write that is stuck
    /// on the network.
    async fn write_frame(&mut self, text: String) -> Flow {
        let Some(socket) = self.socket.as_mut() else {
            return Flow::Continue;
        };
        let bytes = text.len();
        let result = tokio::select! {
            biased;
            _ = &mut self.shutdown => return Flow::Stop,
            result = socket.send_text(text) => result,
        };
        match result {
            Ok(()) => {
                trace!(target: "waterfall.worker", bytes, "frame sent");
            }
            Err(TransportError::Closed) => {
                info!(target: "waterfall.worker", bytes, "peer closed during write");
                self.socket = None;
                if self.transition(Transition::Disconnected) {
                    self.emit(ClientEvent::Disconnected);
                }
            }
            Err(err) => {
                warn!(target: "waterfall.worker", error = %err, bytes, "send failed");
                self.socket = None;
                if self.transition(Transition::Error) {
                    self.emit(ClientEvent::Error(err.to_string()));
                }
            }
        }
        Flow::Continue
    }

    /// Local failure with a healthy socket: close it and report.
    async fn fail(&mut self, reason: String) {
        warn!(target: "waterfall.worker", reason = %reason, "session failed");
        self.close_socket().await;
        if self.transition(Transition::Error) {
            self.emit(ClientEvent::Error(reason));
        }
    }

    async fn close_socket(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            return;
        };
        match tokio::time::timeout(self.config.close_timeout, socket.close()).await {
            Ok(Ok(())) => debug!(target: "waterfall.worker", "socket closed"),
            Ok(Err(err)) => debug!(target: "waterfall.worker", error = %err, "close failed"),
            Err(_) => debug!(
                target: "waterfall.worker",
                timeout = ?self.config.close_timeout,
                "close handshake timed out"
            ),
        }
    }

    async fn finish(mut self) {
        self.connecting = None;
        self.commands.close();
        let mut discarded = 0usize;
        while self.commands.try_recv().is_ok() {
            discarded += 1;
        }

        let was_open = self.socket.is_some();
        self.close_socket().await;
        if was_open && self.transition(Transition::Disconnected) {
            self.emit(ClientEvent::Disconnected);
        }
        info!(target: "waterfall.worker", discarded, "worker stopped");
    }

    fn transition(&mut self, transition: Transition) -> bool {
        match self.state.transition(transition) {
            Ok(next) => {
                debug!(
                    target: "waterfall.worker",
                    from = %self.state,
                    to = %next,
                    "state changed"
                );
                self.state = next;
                true
            }
            Err(err) => {
                warn!(target: "waterfall.worker", error = %err, "ignoring transition");
                false
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }
}
