use std::io;
use std::time::Duration;

use aquatrace_core::{Reading, round_to};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use super::{ReadingSource, SourceError};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1500);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_BAUD_RATE: u32 = 9600;

const MAX_FIELDS: usize = 5;
/// Longest record accepted before the buffered bytes are discarded.
pub const MAX_LINE_LEN: usize = 1024;

/// Opens the byte stream a sensor board writes its records to.
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    type Channel: AsyncRead + Unpin + Send;

    async fn open(&self) -> io::Result<Self::Channel>;

    /// Short description used in log lines.
    fn name(&self) -> &str;
}

/// A serial port, opened in raw mode at a fixed baud rate.
pub struct SerialOpener {
    path: String,
    baud_rate: u32,
}

impl SerialOpener {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

#[async_trait]
impl ChannelOpener for SerialOpener {
    type Channel = SerialStream;

    async fn open(&self) -> io::Result<Self::Channel> {
        let port = tokio_serial::new(self.path.as_str(), self.baud_rate).open_native_async()?;
        Ok(port)
    }

    fn name(&self) -> &str {
        &self.path
    }
}

/// A line stream served over TCP, e.g. by a serial-to-network bridge.
pub struct TcpOpener {
    addr: String,
}

impl TcpOpener {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl ChannelOpener for TcpOpener {
    type Channel = TcpStream;

    async fn open(&self) -> io::Result<Self::Channel> {
        TcpStream::connect(&self.addr).await
    }

    fn name(&self) -> &str {
        &self.addr
    }
}

struct OpenChannel<C> {
    reader: BufReader<C>,
    /// Bytes of a record whose newline has not arrived yet.
    pending: Vec<u8>,
}

impl<C: AsyncRead + Unpin> OpenChannel<C> {
    fn new(channel: C) -> Self {
        Self {
            reader: BufReader::new(channel),
            pending: Vec::new(),
        }
    }

    /// Waits up to `wait` for the rest of the current line.
    ///
    /// `Ok(None)` means no complete line yet; partial bytes are kept for the
    /// next call. A line is only returned once its newline has arrived. Bytes
    /// left without a newline when the channel closes are discarded.
    async fn next_line(&mut self, wait: Duration) -> Result<Option<String>, SourceError> {
        let limit = (MAX_LINE_LEN + 1).saturating_sub(self.pending.len()) as u64;
        let mut bounded = (&mut self.reader).take(limit);
        let read = tokio::time::timeout(wait, bounded.read_until(b'\n', &mut self.pending)).await;

        if self.pending.ends_with(b"\n") {
            let line = String::from_utf8_lossy(&self.pending).trim().to_string();
            self.pending.clear();
            return Ok(Some(line));
        }

        if self.pending.len() > MAX_LINE_LEN {
            let head = String::from_utf8_lossy(&self.pending[..32]).into_owned();
            self.pending.clear();
            return Err(SourceError::Malformed {
                line: head,
                reason: format!("no newline within {MAX_LINE_LEN} bytes"),
            });
        }

        match read {
            Err(_elapsed) => Ok(None),
            Ok(Ok(_)) => {
                self.pending.clear();
                Err(SourceError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "channel closed",
                )))
            }
            Ok(Err(e)) => Err(SourceError::Io(e)),
        }
    }
}

/// Reading source backed by a single line-oriented channel.
///
/// The channel is opened lazily on first use and owned for the lifetime of
/// the source. Access is serialized, so concurrent polls never interleave
/// bytes from the same stream.
pub struct LiveReadingSource<O: ChannelOpener> {
    opener: O,
    channel: Mutex<Option<OpenChannel<O::Channel>>>,
    read_timeout: Duration,
    settle_delay: Duration,
}

impl<O: ChannelOpener> LiveReadingSource<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            channel: Mutex::new(None),
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Delay after a successful open before the first read. Boards that
    /// reset when the port opens need a moment before they emit records.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Opens the channel if it is not open yet. A no-op once open.
    pub async fn connect(&self) -> Result<(), SourceError> {
        let mut slot = self.channel.lock().await;
        self.ensure_open(&mut slot).await
    }

    /// Drops the current handle, if any, and opens a fresh one.
    pub async fn reconnect(&self) -> Result<(), SourceError> {
        let mut slot = self.channel.lock().await;
        if slot.take().is_some() {
            info!(channel = self.opener.name(), "Dropped sensor channel for reconnect");
        }
        self.ensure_open(&mut slot).await
    }

    pub async fn is_connected(&self) -> bool {
        self.channel.lock().await.is_some()
    }

    async fn ensure_open(
        &self,
        slot: &mut Option<OpenChannel<O::Channel>>,
    ) -> Result<(), SourceError> {
        if slot.is_some() {
            return Ok(());
        }

        match self.opener.open().await {
            Ok(channel) => {
                if !self.settle_delay.is_zero() {
                    tokio::time::sleep(self.settle_delay).await;
                }
                info!(channel = self.opener.name(), "Sensor channel opened");
                *slot = Some(OpenChannel::new(channel));
                Ok(())
            }
            Err(e) => {
                warn!(channel = self.opener.name(), error = %e, "Sensor channel open failed");
                Err(SourceError::Unavailable(e.to_string()))
            }
        }
    }

    /// Reads and parses the next record, reporting exactly why none was
    /// produced.
    pub async fn try_acquire(&self) -> Result<Reading, SourceError> {
        let mut slot = self.channel.lock().await;
        self.ensure_open(&mut slot).await?;

        let Some(open) = slot.as_mut() else {
            return Err(SourceError::Unavailable("channel not open".into()));
        };

        match open.next_line(self.read_timeout).await {
            Ok(Some(line)) => parse_line(&line),
            Ok(None) => Err(SourceError::NoNewData),
            Err(e @ SourceError::Io(_)) => {
                *slot = None;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<O: ChannelOpener> ReadingSource for LiveReadingSource<O> {
    async fn acquire(&self) -> Option<Reading> {
        match self.try_acquire().await {
            Ok(reading) => Some(reading),
            Err(SourceError::Unavailable(_)) => {
                Some(Reading::unavailable("Sensor channel not available"))
            }
            Err(SourceError::NoNewData) => {
                debug!(channel = self.opener.name(), "No new sensor record");
                None
            }
            Err(e @ SourceError::Malformed { .. }) => {
                warn!(channel = self.opener.name(), error = %e, "Discarding sensor record");
                None
            }
            Err(SourceError::Io(e)) => {
                warn!(channel = self.opener.name(), error = %e, "Sensor channel lost");
                None
            }
        }
    }
}

/// Parses one `temperature,oxygen,ph,ammonia[,turbidity]` record.
///
/// Missing or empty fields take their defaults (pH 7.0, everything else
/// 0.0). Fields past the fifth must still be numeric but are ignored.
/// Values are rounded to two decimals, ammonia to three.
pub fn parse_line(line: &str) -> Result<Reading, SourceError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(SourceError::NoNewData);
    }

    let malformed = |reason: String| SourceError::Malformed {
        line: line.to_string(),
        reason,
    };

    let mut values: [Option<f64>; MAX_FIELDS] = [None; MAX_FIELDS];
    for (i, field) in line.split(',').map(str::trim).enumerate() {
        if field.is_empty() {
            continue;
        }
        let value = field
            .parse::<f64>()
            .map_err(|e| malformed(format!("field {field:?}: {e}")))?;
        if let Some(slot) = values.get_mut(i) {
            *slot = Some(value);
        }
    }

    let [temperature, oxygen, ph, ammonia, turbidity] = values;

    Ok(Reading {
        temperature: round_to(temperature.unwrap_or(0.0), 2),
        oxygen: round_to(oxygen.unwrap_or(0.0), 2),
        ph: round_to(ph.unwrap_or(Reading::DEFAULT_PH), 2),
        ammonia: round_to(ammonia.unwrap_or(0.0), 3),
        turbidity: round_to(turbidity.unwrap_or(0.0), 2),
        timestamp: jiff::Timestamp::now(),
        error: None,
    })
}
