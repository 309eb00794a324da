//! TCP transport implementation

use crate::error::{EmberError, EmberResult};
use crate::stream::TransportLayer;
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const READ_BUFFER_SIZE: usize = 4096;

/// TCP transport settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    /// Timeout applied to connect and send. Receive waits indefinitely;
    /// liveness is the keepalive timer's job.
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn with_timeout(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            timeout: Some(timeout),
        }
    }
}

/// TCP transport for Ember+ providers
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
}

impl TcpTransport {
    /// Create an unconnected transport from settings.
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
        }
    }

    /// Parse `address`, connect, and return a ready transport.
    pub async fn connect(address: &str) -> EmberResult<Self> {
        let address: SocketAddr = address.parse().map_err(|e| {
            EmberError::UsageError(format!("Invalid TCP address: {}", e))
        })?;

        let mut transport = Self::new(TcpSettings::new(address));
        TransportLayer::connect(&mut transport).await?;
        Ok(transport)
    }

    fn stream_mut(&mut self) -> EmberResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }

    async fn with_timeout<T>(
        timeout: Option<Duration>,
        future: impl std::future::Future<Output = std::io::Result<T>>,
    ) -> EmberResult<T> {
        let result = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, future).await.map_err(|_| {
                EmberError::Connection(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "TCP operation timed out",
                ))
            })?,
            None => future.await,
        };

        result.map_err(EmberError::Connection)
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn connect(&mut self) -> EmberResult<()> {
        if self.stream.is_some() {
            return Err(EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let stream =
            Self::with_timeout(self.settings.timeout, TcpStream::connect(self.settings.address))
                .await?;

        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> EmberResult<()> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        match Self::with_timeout(timeout, stream.write_all(data)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stream = None;
                Err(e)
            }
        }
    }

    async fn receive(&mut self) -> EmberResult<Bytes> {
        let stream = self.stream_mut()?;
        let mut buf = [0u8; READ_BUFFER_SIZE];

        match stream.read(&mut buf).await {
            Ok(0) => {
                self.stream = None;
                Err(EmberError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Connection closed by peer",
                )))
            }
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) => {
                self.stream = None;
                Err(EmberError::Connection(e))
            }
        }
    }

    async fn close(&mut self) -> EmberResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
