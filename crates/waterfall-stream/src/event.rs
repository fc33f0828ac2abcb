/// Lifecycle notifications broadcast by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    Error(String),
}
