//! TCP transport to a device.
//!
//! Every call opens its own connection, writes one frame and closes the
//! socket again on every exit path. Connections are never pooled or reused.

use crate::config::ClientConfig;
use crate::device::Device;
use crate::error::{Result, TuyaError};
use crate::protocol;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};

/// Phases of a request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Idle,
    Connecting,
    Reading,
    /// Terminator seen or the peer closed the connection.
    Done,
    /// The response deadline passed first.
    TimedOut,
}

/// Accumulates response chunks until the 55AA suffix arrives.
#[derive(Debug)]
pub struct FrameReader {
    state: ReadState,
    buf: Vec<u8>,
    max_size: usize,
}

impl FrameReader {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: ReadState::Idle,
            buf: Vec::new(),
            max_size,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    pub fn set_state(&mut self, state: ReadState) {
        self.state = state;
    }

    /// Feeds one chunk. An empty chunk means the peer closed the connection.
    ///
    /// Fails when the accumulated response would exceed the size limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<ReadState> {
        if chunk.is_empty() {
            self.state = ReadState::Done;
            return Ok(self.state);
        }
        if self.buf.len() + chunk.len() > self.max_size {
            return Err(TuyaError::Protocol(format!(
                "response exceeds {} bytes",
                self.max_size
            )));
        }
        self.buf.extend_from_slice(chunk);
        self.state = if protocol::ends_with_suffix(&self.buf) {
            ReadState::Done
        } else {
            ReadState::Reading
        };
        Ok(self.state)
    }

    pub fn time_out(&mut self) {
        self.state = ReadState::TimedOut;
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ReadState::Done | ReadState::TimedOut)
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Sends frames to devices over short-lived TCP connections.
#[derive(Debug, Clone)]
pub struct Transport {
    connect_timeout: Duration,
    response_timeout: Duration,
    ack_timeout: Duration,
    chunk_size: usize,
    max_frame_size: usize,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            response_timeout: config.response_timeout,
            ack_timeout: config.ack_timeout,
            chunk_size: config.read_chunk_size.max(1),
            max_frame_size: config.max_frame_size,
        }
    }

    /// Writes `bytes` and reads at most one chunk of acknowledgement, whose
    /// content and outcome are ignored.
    pub async fn send_fire_and_forget(&self, device: &Device, bytes: &[u8]) -> Result<()> {
        let mut stream = self.connect(device).await?;

        let result: Result<()> = async {
            self.write_frame(&mut stream, device, bytes).await?;
            let mut chunk = vec![0u8; self.chunk_size];
            match timeout(self.ack_timeout, stream.read(&mut chunk)).await {
                Ok(Ok(n)) => debug!("Ack from {}: {} bytes", device.dev_id, n),
                Ok(Err(e)) => debug!("Ack read from {} failed: {}", device.dev_id, e),
                Err(_) => debug!("No ack from {} within {:?}", device.dev_id, self.ack_timeout),
            }
            Ok(())
        }
        .await;

        close(stream).await;
        result
    }

    /// Writes `bytes` and accumulates the response until the frame suffix
    /// arrives, the peer closes, or the response deadline passes.
    ///
    /// Whatever was accumulated is returned, possibly empty or truncated;
    /// deciding whether it is a usable frame is left to the codec.
    pub async fn send_and_receive_frame(&self, device: &Device, bytes: &[u8]) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.response_timeout;
        let mut reader = FrameReader::new(self.max_frame_size);

        reader.set_state(ReadState::Connecting);
        let mut stream = match timeout_at(deadline, self.connect(device)).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(TuyaError::Connection(format!(
                    "connecting to {} outlasted the response deadline",
                    device.address()
                )));
            }
        };

        let result: Result<()> = async {
            self.write_frame(&mut stream, device, bytes).await?;
            reader.set_state(ReadState::Reading);

            let mut chunk = vec![0u8; self.chunk_size];
            while !reader.is_finished() {
                match timeout_at(deadline, stream.read(&mut chunk)).await {
                    Ok(Ok(n)) => {
                        reader.push(&chunk[..n])?;
                    }
                    Ok(Err(e)) => {
                        if reader.buffered() == 0 {
                            return Err(TuyaError::Connection(format!(
                                "read from {} failed: {}",
                                device.address(),
                                e
                            )));
                        }
                        warn!(
                            "Read from {} failed after {} bytes: {}",
                            device.dev_id,
                            reader.buffered(),
                            e
                        );
                        reader.set_state(ReadState::Done);
                    }
                    Err(_) => reader.time_out(),
                }
            }
            Ok(())
        }
        .await;

        close(stream).await;
        result?;

        debug!(
            "Response from {} finished in state {:?} with {} bytes",
            device.dev_id,
            reader.state(),
            reader.buffered()
        );
        Ok(reader.into_bytes())
    }

    async fn connect(&self, device: &Device) -> Result<TcpStream> {
        let addr = device.address();
        info!("Connecting to device {} at {}", device.dev_id, addr);

        timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                TuyaError::Connection(format!(
                    "connect to {} timed out after {:?}",
                    addr, self.connect_timeout
                ))
            })?
            .map_err(|e| TuyaError::Connection(format!("connect to {} failed: {}", addr, e)))
    }

    async fn write_frame(&self, stream: &mut TcpStream, device: &Device, bytes: &[u8]) -> Result<()> {
        debug!("Sending {} bytes to {}: {}", bytes.len(), device.dev_id, hex::encode(bytes));
        timeout(self.connect_timeout, stream.write_all(bytes))
            .await
            .map_err(|_| TuyaError::Connection(format!("write to {} timed out", device.address())))?
            .map_err(|e| TuyaError::Connection(format!("write to {} failed: {}", device.address(), e)))
    }
}

async fn close(mut stream: TcpStream) {
    if let Err(e) = stream.shutdown().await {
        debug!("Socket shutdown: {}", e);
    }
}
