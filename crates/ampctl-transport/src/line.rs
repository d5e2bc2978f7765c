//! Serialized line channel over a single half-duplex serial link.
//!
//! [`SerialLine`] owns the one physical connection to the amplifier and
//! puts every byte-level operation behind one async lock. The medium is
//! single-channel: a reader must never interleave with a concurrent
//! writer, and the device gives no acknowledgement, so writes are followed
//! by a fixed settle delay instead.
//!
//! The connection is opened lazily through a [`Connector`] on the first
//! operation. A link-level failure drops it so that the next operation
//! reopens the port; this is how the channel recovers after a USB adapter
//! is replugged.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use ampctl_core::error::{Error, Result};
use ampctl_core::transport::{Connector, Transport};

/// Upper bound on lines drained by one [`SerialLine::read_until_idle`] call.
///
/// The drain also stops once the read timeout has elapsed since it began.
pub const MAX_IDLE_LINES: usize = 64;

/// Upper bound on reads spent flushing pending input before a query.
const MAX_FLUSH_READS: usize = 16;

/// Receive buffer size beyond which an unterminated line is discarded.
const MAX_LINE: usize = 1024;

/// Timing parameters for the line channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTiming {
    /// Bound on waiting for one line.
    pub read_timeout: Duration,
    /// Bound on writing one command.
    pub write_timeout: Duration,
    /// Pause after each write so the device can process it.
    pub settle_delay: Duration,
}

impl Default for LineTiming {
    fn default() -> Self {
        LineTiming {
            read_timeout: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(500),
            settle_delay: Duration::from_millis(100),
        }
    }
}

impl LineTiming {
    /// Default timeouts with the given settle delay.
    pub fn with_settle_delay(settle_delay: Duration) -> Self {
        LineTiming {
            settle_delay,
            ..Default::default()
        }
    }
}

/// Whether the line currently holds an open port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

struct LineInner {
    transport: Option<Box<dyn Transport>>,
    /// Bytes received but not yet returned as a complete line.
    rx_buf: Vec<u8>,
}

/// Exclusive, lazily connected line channel to the amplifier.
pub struct SerialLine {
    connector: Box<dyn Connector>,
    timing: LineTiming,
    inner: Mutex<LineInner>,
}

impl SerialLine {
    /// Create a closed line. Nothing is opened until the first operation.
    pub fn new(connector: Box<dyn Connector>, timing: LineTiming) -> Self {
        SerialLine {
            connector,
            timing,
            inner: Mutex::new(LineInner {
                transport: None,
                rx_buf: Vec::new(),
            }),
        }
    }

    /// The timing parameters this line was built with.
    pub fn timing(&self) -> &LineTiming {
        &self.timing
    }

    /// Name of the endpoint (serial port path), for logging and display.
    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        let inner = self.inner.lock().await;
        if inner.transport.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Open the port if it is not already open.
    ///
    /// Fails with [`Error::Connectivity`] if the port cannot be opened.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_connected(&mut inner).await.map(|_| ())
    }

    /// Close the port and release the OS handle.
    ///
    /// The next operation reopens it.
    pub async fn disconnect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.rx_buf.clear();
        if let Some(mut transport) = inner.transport.take() {
            debug!(port = %self.endpoint(), "Disconnecting serial line");
            transport.close().await?;
        }
        Ok(())
    }

    /// Write one raw command string, then wait the settle delay.
    ///
    /// The lock is released before the settle delay starts.
    pub async fn write_line(&self, data: &str) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            self.write_locked(&mut inner, data).await?;
        }
        tokio::time::sleep(self.timing.settle_delay).await;
        Ok(())
    }

    /// Read one newline-terminated line, bounded by the read timeout.
    ///
    /// The terminator and any trailing `\r` are stripped. Returns
    /// [`Error::Timeout`] if no complete line arrives in time.
    pub async fn read_line(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.read_line_locked(&mut inner).await
    }

    /// Drain lines until the line goes quiet and return them joined by `\n`.
    ///
    /// Never writes, so it is safe to use against a device that may be
    /// down. The result is empty when the device said nothing.
    ///
    /// The whole drain shares one read-timeout budget, so the lock is held
    /// no longer than `read_timeout` however chatty the device is.
    pub async fn read_until_idle(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let deadline = Instant::now() + self.timing.read_timeout;
        let mut lines = Vec::new();

        while lines.len() < MAX_IDLE_LINES {
            match self.read_line_before(&mut inner, deadline).await {
                Ok(line) => lines.push(line),
                Err(Error::Timeout) => break,
                Err(e) => return Err(e),
            }
        }

        // An unterminated fragment still proves the device is talking.
        if !inner.rx_buf.is_empty() {
            let partial = std::mem::take(&mut inner.rx_buf);
            lines.push(String::from_utf8_lossy(&partial).into_owned());
        }

        trace!(port = %self.endpoint(), lines = lines.len(), "Idle read finished");
        Ok(lines.join("\n"))
    }

    /// Write a command and read its reply line under a single lock hold.
    ///
    /// No other caller can write or read between the command and its
    /// reply. Stale bytes, both buffered here and already waiting on the
    /// port, are discarded before writing.
    ///
    /// Anything the device sends after the flush but before the reply
    /// (e.g. a late trailer) is still taken as the reply; decoders treat
    /// such lines as undecodable rather than failing.
    pub async fn query(&self, data: &str) -> Result<String> {
        let mut inner = self.inner.lock().await;
        self.flush_input(&mut inner).await?;
        self.write_locked(&mut inner, data).await?;
        tokio::time::sleep(self.timing.settle_delay).await;
        self.read_line_locked(&mut inner).await
    }

    async fn ensure_connected<'a>(
        &self,
        inner: &'a mut MutexGuard<'_, LineInner>,
    ) -> Result<&'a mut Box<dyn Transport>> {
        if inner.transport.is_none() {
            debug!(port = %self.endpoint(), "Opening serial line");
            let transport = self.connector.connect().await.map_err(|e| match e {
                Error::Connectivity(msg) => Error::Connectivity(msg),
                other => Error::Connectivity(format!(
                    "can't open the connection on {}: {other}",
                    self.endpoint()
                )),
            })?;
            info!(port = %self.endpoint(), "Serial line connected");
            inner.rx_buf.clear();
            inner.transport = Some(transport);
        }
        inner.transport.as_mut().ok_or(Error::NotConnected)
    }

    /// Discard buffered bytes and whatever the port already has pending,
    /// without waiting for more.
    async fn flush_input(&self, inner: &mut MutexGuard<'_, LineInner>) -> Result<()> {
        let mut stale = std::mem::take(&mut inner.rx_buf).len();
        let mut buf = [0u8; 256];

        for _ in 0..MAX_FLUSH_READS {
            let result = {
                let transport = self.ensure_connected(inner).await?;
                transport.receive(&mut buf, Duration::ZERO).await
            };
            match result {
                Ok(0) | Err(Error::Timeout) => break,
                Ok(n) => stale += n,
                Err(e) => {
                    self.drop_link(inner, &e.to_string()).await;
                    return Err(Error::Connectivity(format!(
                        "read from {} failed: {e}",
                        self.endpoint()
                    )));
                }
            }
        }

        if stale > 0 {
            debug!(port = %self.endpoint(), bytes = stale, "Discarding stale bytes before query");
        }
        Ok(())
    }

    async fn write_locked(&self, inner: &mut MutexGuard<'_, LineInner>, data: &str) -> Result<()> {
        let result = {
            let transport = self.ensure_connected(inner).await?;
            trace!(port = %self.endpoint(), cmd = data, "Writing line");
            tokio::time::timeout(self.timing.write_timeout, transport.send(data.as_bytes())).await
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.drop_link(inner, &e.to_string()).await;
                Err(Error::Connectivity(format!(
                    "write to {} failed: {e}",
                    self.endpoint()
                )))
            }
            Err(_) => {
                self.drop_link(inner, "write timed out").await;
                Err(Error::Connectivity(format!(
                    "write to {} timed out after {:?}",
                    self.endpoint(),
                    self.timing.write_timeout
                )))
            }
        }
    }

    async fn read_line_locked(&self, inner: &mut MutexGuard<'_, LineInner>) -> Result<String> {
        let deadline = Instant::now() + self.timing.read_timeout;
        self.read_line_before(inner, deadline).await
    }

    /// Read one line, giving up with [`Error::Timeout`] at `deadline`.
    async fn read_line_before(
        &self,
        inner: &mut MutexGuard<'_, LineInner>,
        deadline: Instant,
    ) -> Result<String> {
        loop {
            if let Some(line) = take_line(&mut inner.rx_buf) {
                trace!(port = %self.endpoint(), line = %line, "Read line");
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }

            let mut buf = [0u8; 256];
            let result = {
                let transport = self.ensure_connected(inner).await?;
                transport.receive(&mut buf, remaining).await
            };

            match result {
                Ok(0) => tokio::task::yield_now().await,
                Ok(n) => {
                    inner.rx_buf.extend_from_slice(&buf[..n]);
                    if inner.rx_buf.len() > MAX_LINE && !inner.rx_buf.contains(&b'\n') {
                        warn!(
                            port = %self.endpoint(),
                            len = inner.rx_buf.len(),
                            "Unterminated line overflow, discarding"
                        );
                        inner.rx_buf.clear();
                    }
                }
                Err(Error::Timeout) => return Err(Error::Timeout),
                Err(e) => {
                    self.drop_link(inner, &e.to_string()).await;
                    return Err(Error::Connectivity(format!(
                        "read from {} failed: {e}",
                        self.endpoint()
                    )));
                }
            }
        }
    }

    /// Drop the current transport so the next operation reconnects.
    async fn drop_link(&self, inner: &mut MutexGuard<'_, LineInner>, reason: &str) {
        inner.rx_buf.clear();
        if let Some(mut transport) = inner.transport.take() {
            warn!(port = %self.endpoint(), reason, "Serial link failed, closing");
            if let Err(e) = transport.close().await {
                debug!(port = %self.endpoint(), error = %e, "Close after failure also failed");
            }
        }
    }
}

/// Split one `\n`-terminated line off the front of `buf`.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}
