//! Ember+ connection pump
//!
//! Owns the transport, the frame decoder and the fragment reassembler.
//! Outbound root elements are queued and flushed in batches at the start
//! of a poll turn; inbound frames are decoded into Glow roots and handed
//! to the caller in arrival order. Keepalive requests from the peer are
//! answered here, transparently.

use crate::error::{EmberError, EmberResult};
use ember_asn1::{GlowRoot, GlowRootElement, Tlv};
use ember_s101::{
    encode_ember_payload, encode_keepalive_request, encode_keepalive_response, parse_message,
    FragmentReassembler, FrameDecoder, S101Message,
};
use ember_transport::TransportLayer;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_BATCH_SIZE: usize = 16;

/// A framed Ember+ connection over some transport.
pub struct Connection<T: TransportLayer> {
    transport: T,
    decoder: FrameDecoder,
    reassembler: FragmentReassembler,
    queue: VecDeque<GlowRootElement>,
    batch_size: usize,
    keepalive_interval: Option<Duration>,
    last_write: Instant,
    closed: bool,
}

impl<T: TransportLayer> Connection<T> {
    /// Wrap a connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            decoder: FrameDecoder::new(),
            reassembler: FragmentReassembler::new(),
            queue: VecDeque::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            keepalive_interval: None,
            last_write: Instant::now(),
            closed: false,
        }
    }

    /// Maximum number of root elements per outgoing message.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// Enable or disable the keepalive timer.
    ///
    /// With an interval of T, a keepalive request is sent once no write
    /// has happened for T. The deadline is armed from the last write, so
    /// a steady stream of inbound data does not postpone it.
    pub fn set_keepalive_interval(&mut self, interval: Option<Duration>) {
        self.keepalive_interval = interval;
    }

    pub fn is_connected(&self) -> bool {
        !self.closed && self.transport.is_connected()
    }

    fn ensure_open(&self) -> EmberResult<()> {
        if self.closed {
            return Err(EmberError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Connection is closed",
            )));
        }
        Ok(())
    }

    /// Queue a root element for the next flush.
    pub fn enqueue(&mut self, element: GlowRootElement) {
        self.queue.push_back(element);
    }

    /// Send everything queued, at most `batch_size` elements per message,
    /// all messages in one transport write.
    pub async fn flush(&mut self) -> EmberResult<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;

        let mut wire = Vec::new();
        while !self.queue.is_empty() {
            let take = self.queue.len().min(self.batch_size);
            let group: Vec<GlowRootElement> = self.queue.drain(..take).collect();

            let payload = GlowRoot::Elements(group).encode().encode()?;
            wire.extend_from_slice(&encode_ember_payload(&payload)?);
        }

        self.transport.send(&wire).await?;
        self.last_write = Instant::now();
        Ok(())
    }

    pub async fn send_keepalive_request(&mut self) -> EmberResult<()> {
        self.ensure_open()?;
        let frame = encode_keepalive_request()?;
        self.transport.send(&frame).await?;
        self.last_write = Instant::now();
        Ok(())
    }

    async fn send_keepalive_response(&mut self) -> EmberResult<()> {
        let frame = encode_keepalive_response()?;
        self.transport.send(&frame).await?;
        self.last_write = Instant::now();
        Ok(())
    }

    /// Drive the connection one turn: flush the queue, then wait for
    /// inbound data and return the decoded roots of the next complete
    /// message(s). Keepalive traffic never surfaces here.
    pub async fn poll(&mut self) -> EmberResult<Vec<GlowRoot>> {
        self.ensure_open()?;
        self.flush().await?;

        loop {
            let roots = self.drain_frames().await?;
            if !roots.is_empty() {
                return Ok(roots);
            }

            let data = match self.keepalive_interval {
                Some(interval) => {
                    // the deadline follows last_write only, so inbound
                    // traffic cannot push it back
                    if self.last_write.elapsed() >= interval {
                        self.send_keepalive_request().await?;
                    }
                    let deadline = self.last_write + interval;

                    let received = tokio::select! {
                        data = self.transport.receive() => Some(data?),
                        _ = tokio::time::sleep_until(deadline) => None,
                    };
                    match received {
                        Some(data) => data,
                        None => continue,
                    }
                }
                None => self.transport.receive().await?,
            };

            self.decoder.feed(&data);
        }
    }

    /// Decode every complete frame currently buffered.
    async fn drain_frames(&mut self) -> EmberResult<Vec<GlowRoot>> {
        let mut roots = Vec::new();

        while let Some(frame) = self.decoder.parse()? {
            match parse_message(&frame)? {
                S101Message::KeepaliveRequest => {
                    self.send_keepalive_response().await?;
                }
                S101Message::KeepaliveResponse => {}
                message => {
                    if let Some(payload) = self.reassembler.handle(message)? {
                        decode_payload(&payload, &mut roots)?;
                    }
                }
            }
        }

        Ok(roots)
    }

    /// Close the transport; all further operations fail.
    pub async fn close(&mut self) -> EmberResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::info!("Closing Ember+ connection");
        self.transport.close().await
    }
}

/// A message payload may hold several consecutive top-level TLVs; decode
/// them all in order.
fn decode_payload(payload: &[u8], roots: &mut Vec<GlowRoot>) -> EmberResult<()> {
    let mut pos = 0;

    while pos < payload.len() {
        let (tlv, next) = Tlv::decode_from(payload, pos)?;
        pos = next;
        roots.push(GlowRoot::decode(&tlv)?);
    }

    Ok(())
}
