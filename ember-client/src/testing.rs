//! In-memory transport for tests

use crate::error::{EmberError, EmberResult};
use async_trait::async_trait;
use bytes::Bytes;
use ember_transport::TransportLayer;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Transport fed from a queue of canned inbound chunks; everything sent
/// through it is captured for inspection.
pub(crate) struct MockTransport {
    incoming: Arc<Mutex<VecDeque<Bytes>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    connected: bool,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let incoming = Arc::new(Mutex::new(VecDeque::new()));
        let sent = Arc::new(Mutex::new(Vec::new()));

        let handle = MockHandle {
            incoming: incoming.clone(),
            sent: sent.clone(),
        };
        let transport = Self {
            incoming,
            sent,
            connected: true,
        };
        (transport, handle)
    }
}

/// Test-side view of a [`MockTransport`] after it moved into a connection.
#[derive(Clone)]
pub(crate) struct MockHandle {
    incoming: Arc<Mutex<VecDeque<Bytes>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockHandle {
    pub fn push_incoming(&self, data: &[u8]) {
        self.incoming
            .lock()
            .unwrap()
            .push_back(Bytes::copy_from_slice(data));
    }

    /// Drain and return everything written so far.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

#[async_trait]
impl TransportLayer for MockTransport {
    async fn connect(&mut self) -> EmberResult<()> {
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> EmberResult<()> {
        if !self.connected {
            return Err(EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Mock transport closed",
            )));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn receive(&mut self) -> EmberResult<Bytes> {
        if !self.connected {
            return Err(EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Mock transport closed",
            )));
        }
        self.incoming.lock().unwrap().pop_front().ok_or_else(|| {
            EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No more test data",
            ))
        })
    }

    async fn close(&mut self) -> EmberResult<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
