//! Transport to the EPS board.
//!
//! The board is reached either through a character device (USB CDC / UART,
//! line settings configured by the host) or through a serial-over-TCP bridge
//! (`tcp://host:port`). The transport is split into a read half, owned by the
//! processing loop as a [`LineSource`], and a write half shared with the
//! control surface as a [`CommandWriter`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::runtime::config_loader::TransportConfig;

const TCP_SCHEME: &str = "tcp://";

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Error type for transport operations
#[derive(Debug)]
pub enum TransportError {
    Open {
        target: String,
        source: std::io::Error,
    },
    InvalidAddress(String),
    Read(std::io::Error),
    Write(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Open { target, source } => {
                write!(f, "Failed to open transport '{}': {}", target, source)
            }
            TransportError::InvalidAddress(addr) => write!(f, "Invalid transport address: {}", addr),
            TransportError::Read(e) => write!(f, "Transport read failed: {}", e),
            TransportError::Write(e) => write!(f, "Transport write failed: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

/// Parsed `transport.device` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    Device(PathBuf),
    Tcp(String),
}

impl TransportTarget {
    pub fn parse(device: &str) -> Result<Self, TransportError> {
        let device = device.trim();
        if let Some(addr) = device.strip_prefix(TCP_SCHEME) {
            if addr.is_empty() || !addr.contains(':') {
                return Err(TransportError::InvalidAddress(device.to_string()));
            }
            return Ok(TransportTarget::Tcp(addr.to_string()));
        }
        if device.is_empty() {
            return Err(TransportError::InvalidAddress(device.to_string()));
        }
        Ok(TransportTarget::Device(PathBuf::from(device)))
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportTarget::Device(path) => write!(f, "{}", path.display()),
            TransportTarget::Tcp(addr) => write!(f, "{}{}", TCP_SCHEME, addr),
        }
    }
}

/// An open connection to the board.
pub struct Transport {
    pub lines: LineSource<BoxedReader>,
    pub commands: CommandWriter,
}

impl Transport {
    /// Open the configured transport.
    ///
    /// Device reads run on tokio's blocking pool, so a read in progress
    /// only returns when the board sends more bytes. Dropping the runtime
    /// waits for it; binaries exit the process once shutdown is complete.
    ///
    /// # Errors
    /// Fails when the device cannot be opened or the bridge refuses the
    /// connection. Callers treat this as fatal.
    pub async fn open(config: &TransportConfig) -> Result<Self, TransportError> {
        let target = TransportTarget::parse(&config.device)?;
        let read_timeout = Duration::from_millis(config.read_timeout_ms);

        let (reader, writer): (BoxedReader, BoxedWriter) = match &target {
            TransportTarget::Device(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .await
                    .map_err(|source| TransportError::Open {
                        target: target.to_string(),
                        source,
                    })?;
                let write_half = file.try_clone().await.map_err(|source| TransportError::Open {
                    target: target.to_string(),
                    source,
                })?;
                (Box::new(file), Box::new(write_half))
            }
            TransportTarget::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|source| TransportError::Open {
                        target: target.to_string(),
                        source,
                    })?;
                let (read_half, write_half) = stream.into_split();
                (Box::new(read_half), Box::new(write_half))
            }
        };

        tracing::info!(transport = %target, "Transport open");
        Ok(Self::from_parts(reader, writer, read_timeout))
    }

    /// Assemble a transport from already-open halves.
    pub fn from_parts(reader: BoxedReader, writer: BoxedWriter, read_timeout: Duration) -> Self {
        Self {
            lines: LineSource::new(reader, read_timeout),
            commands: CommandWriter::new(writer),
        }
    }
}

/// What the line source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// One trimmed, non-empty line
    Line(String),
    /// No complete line arrived within the read timeout
    Timeout,
    /// End of stream
    Closed,
}

/// Newline-delimited text lines with a bounded read timeout.
pub struct LineSource<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    read_timeout: Duration,
    dropped: u64,
}

impl<R: AsyncRead + Unpin> LineSource<R> {
    pub fn new(reader: R, read_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            read_timeout,
            dropped: 0,
        }
    }

    /// Wait for the next line, timeout, or end of stream.
    ///
    /// Empty lines are skipped. Lines that are not valid UTF-8 are dropped.
    /// A line interrupted by a timeout keeps its bytes and is completed by
    /// the next call.
    pub async fn next_event(&mut self) -> Result<LineEvent, TransportError> {
        loop {
            let read = tokio::time::timeout(
                self.read_timeout,
                self.reader.read_until(b'\n', &mut self.buf),
            )
            .await;

            let n = match read {
                Err(_) => return Ok(LineEvent::Timeout),
                Ok(result) => result.map_err(TransportError::Read)?,
            };

            if n == 0 && self.buf.is_empty() {
                return Ok(LineEvent::Closed);
            }

            let raw = std::mem::take(&mut self.buf);
            match String::from_utf8(raw) {
                Ok(text) => {
                    let line = text.trim();
                    if !line.is_empty() {
                        return Ok(LineEvent::Line(line.to_string()));
                    }
                }
                Err(e) => {
                    self.dropped += 1;
                    tracing::debug!("Dropping undecodable line: {}", e);
                }
            }
        }
    }

    /// Lines dropped because they were not valid UTF-8.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Serialized writer for raw command bytes.
#[derive(Clone)]
pub struct CommandWriter {
    inner: Arc<tokio::sync::Mutex<BoxedWriter>>,
}

impl CommandWriter {
    pub fn new(writer: BoxedWriter) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(writer)),
        }
    }

    /// Write bytes and flush. Concurrent callers are serialized.
    pub async fn write_raw(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.inner.lock().await;
        writer.write_all(bytes).await.map_err(TransportError::Write)?;
        writer.flush().await.map_err(TransportError::Write)
    }
}
