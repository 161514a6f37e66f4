//! Transport seam
//!
//! The session writes finished wire bytes through a [`Responder`] and never
//! owns a socket itself.

pub trait Responder: Send + Sync {
    /// Write one raw message. False when the transport could not take it.
    fn send(&self, data: &[u8]) -> bool;

    /// Close the connection.
    fn disconnect(&self);

    fn remote_address(&self) -> Option<String> {
        None
    }
}
