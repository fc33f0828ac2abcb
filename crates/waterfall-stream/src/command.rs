use tokio::sync::mpsc;
use tracing::debug;
use waterfall_proto::Rgb;

/// A request for the worker. Everything it references is owned, so the caller's
/// buffers are free for reuse as soon as the command is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Open {
        url: String,
    },
    Init {
        callsign: String,
        mode: String,
        width: u32,
        height: u32,
    },
    Row {
        y: u32,
        pixels: Vec<Rgb>,
    },
}

impl Command {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Command::Open { .. } => "open",
            Command::Init { .. } => "init",
            Command::Row { .. } => "row",
        }
    }
}

pub(crate) type CommandReceiver = mpsc::UnboundedReceiver<Command>;

/// Producer side of the command queue. Unbounded, so submitting never waits and
/// never fails for capacity.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<Command>,
}

impl Dispatcher {
    pub(crate) fn new() -> (Self, CommandReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn submit(&self, command: Command) {
        if let Err(err) = self.tx.send(command) {
            debug!(
                target: "waterfall.client",
                command = err.0.kind(),
                "worker stopped; discarding command"
            );
        }
    }
}
