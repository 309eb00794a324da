//! Transport abstraction

use crate::error::EmberResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Byte-stream transport carrying S101 frames.
///
/// Implementations deliver bytes in order but with arbitrary read
/// boundaries; the framing layer above reassembles. After `close`, every
/// operation must fail with a `Connection` error rather than silently
/// doing nothing.
#[async_trait]
pub trait TransportLayer: Send {
    /// Establish the connection.
    async fn connect(&mut self) -> EmberResult<()>;

    /// Write all of `data` to the peer.
    async fn send(&mut self, data: &[u8]) -> EmberResult<()>;

    /// Wait for the next chunk of received bytes.
    async fn receive(&mut self) -> EmberResult<Bytes>;

    /// Shut the connection down.
    async fn close(&mut self) -> EmberResult<()>;

    /// Whether the transport is currently usable.
    fn is_connected(&self) -> bool;
}
