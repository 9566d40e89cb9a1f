//! Serial console session
//!
//! A [`Session`] exclusively owns one opened port. All port I/O happens
//! in a single spawned task; the handle talks to it over a command
//! channel, so writes, control-line changes and BREAK emulation
//! linearize with each other. RX bytes fan out to a primary bounded
//! channel plus any number of registered watchers — all lossy under
//! back pressure by design, with the transcript files as the lossless
//! path.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serialport::SerialPort;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use scout_engine::normalize::clean_for_evidence;
use scout_engine::probe::{ProbeTransport, TransportError};

use crate::error::SerialError;

/// CR/LF translation applied to outgoing writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
pub enum CrlfMode {
    /// Every lone `\n` becomes `\r\n`; existing `\r\n` pairs untouched.
    #[serde(rename = "CRLF")]
    #[default]
    Crlf,
    /// Every `\n` becomes `\r`.
    #[serde(rename = "CR")]
    Cr,
    /// Pass-through.
    #[serde(rename = "LF")]
    Lf,
}

/// Parity setting, serialized in the config file as "N" / "O" / "E".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
pub enum Parity {
    #[serde(rename = "N")]
    #[default]
    None,
    #[serde(rename = "O")]
    Odd,
    #[serde(rename = "E")]
    Even,
}

/// Configuration for one serial session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub port_path: String,
    pub baud: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub crlf_mode: CrlfMode,
    /// Echo TX locally in the terminal layer; the session itself never
    /// echoes.
    pub local_echo: bool,
    pub log_to_file: bool,
    /// Transcript directory override; defaults to the host state dir.
    pub log_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// 8/N/1, CRLF, no echo, no logging.
    pub fn new(port_path: impl Into<String>, baud: u32) -> Self {
        Self {
            port_path: port_path.into(),
            baud,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            crlf_mode: CrlfMode::Crlf,
            local_echo: false,
            log_to_file: false,
            log_dir: None,
        }
    }
}

/// Apply CR/LF translation to an outgoing buffer.
pub fn translate_line_endings(mode: CrlfMode, data: &[u8]) -> Vec<u8> {
    match mode {
        CrlfMode::Crlf => {
            let mut out = Vec::with_capacity(data.len() * 2);
            let mut prev = 0u8;
            for &b in data {
                if b == b'\n' && prev != b'\r' {
                    out.push(b'\r');
                }
                out.push(b);
                prev = b;
            }
            out
        }
        CrlfMode::Cr => data
            .iter()
            .map(|&b| if b == b'\n' { b'\r' } else { b })
            .collect(),
        CrlfMode::Lf => data.to_vec(),
    }
}

/// NUL bytes emitted for a BREAK of the given duration at baud/10.
pub fn break_null_count(duration: Duration) -> usize {
    (duration.as_millis() as usize).div_ceil(10).max(1)
}

/// Whether the trimmed accumulator ends with any terminator. Terminators
/// that trim to empty are skipped.
pub fn ends_with_terminator(accumulated: &str, terminators: &[&str]) -> bool {
    let trimmed = accumulated.trim();
    terminators
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .any(|t| trimmed.ends_with(t))
}

/// Byte transport plus the control lines a console session needs. The
/// physical implementation is [`SerialStream`]; in-memory transports
/// back virtual consoles and tests.
pub trait ConsoleTransport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    fn set_dtr(&mut self, level: bool) -> std::io::Result<()>;
    fn set_rts(&mut self, level: bool) -> std::io::Result<()>;
    fn set_baud(&mut self, baud: u32) -> std::io::Result<()>;
}

impl ConsoleTransport for SerialStream {
    fn set_dtr(&mut self, level: bool) -> std::io::Result<()> {
        SerialPort::write_data_terminal_ready(self, level)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    fn set_rts(&mut self, level: bool) -> std::io::Result<()> {
        SerialPort::write_request_to_send(self, level)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    fn set_baud(&mut self, baud: u32) -> std::io::Result<()> {
        SerialPort::set_baud_rate(self, baud)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

/// Counters and line state shared between the handle and the I/O task.
#[derive(Debug, Default)]
struct SessionStats {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    dtr: AtomicBool,
    rts: AtomicBool,
}

enum Command {
    Write {
        data: Vec<u8>,
        resp: oneshot::Sender<Result<usize, SerialError>>,
    },
    SendBreak {
        duration: Duration,
        resp: oneshot::Sender<Result<(), SerialError>>,
    },
    SetDtr {
        level: bool,
        resp: oneshot::Sender<Result<(), SerialError>>,
    },
    SetRts {
        level: bool,
        resp: oneshot::Sender<Result<(), SerialError>>,
    },
    Watch {
        tx: mpsc::Sender<Vec<u8>>,
        resp: oneshot::Sender<u64>,
    },
    Unwatch {
        id: u64,
    },
    Close {
        resp: oneshot::Sender<()>,
    },
}

/// Capacity of the primary RX channel.
const PRIMARY_CHANNEL_CAPACITY: usize = 100;
/// Capacity of the error channel.
const ERROR_CHANNEL_CAPACITY: usize = 10;
/// Capacity of a per-watcher queue.
const WATCHER_CHANNEL_CAPACITY: usize = 32;
/// Reader chunk size.
const READ_BUFFER_SIZE: usize = 4096;
/// Default `read_until` deadline when the caller passes zero.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1200);

/// An active serial console session.
pub struct Session {
    id: String,
    config: SessionConfig,
    cmd_tx: mpsc::Sender<Command>,
    closed_rx: watch::Receiver<bool>,
    stats: Arc<SessionStats>,
    read_rx: Option<mpsc::Receiver<Vec<u8>>>,
    err_rx: Option<mpsc::Receiver<SerialError>>,
    log_path: Option<PathBuf>,
    txt_log_path: Option<PathBuf>,
}

impl Session {
    /// Open the configured port and start the session.
    pub fn open(config: SessionConfig) -> Result<Self, SerialError> {
        let stream = tokio_serial::new(&config.port_path, config.baud)
            .data_bits(to_data_bits(config.data_bits))
            .parity(to_parity(config.parity))
            .stop_bits(to_stop_bits(config.stop_bits))
            .open_native_async()
            .map_err(|e| SerialError::OpenFailed {
                port: config.port_path.clone(),
                source: e,
            })?;

        Self::attach(stream, config)
    }

    /// Start a session over an already-open transport. This is the seam
    /// virtual consoles and tests plug into; [`Session::open`] uses it
    /// with the physical port.
    pub fn attach<S: ConsoleTransport>(stream: S, config: SessionConfig) -> Result<Self, SerialError> {
        let opened_at = chrono::Utc::now();
        let base_name = config
            .port_path
            .rsplit('/')
            .next()
            .unwrap_or(&config.port_path)
            .to_string();
        let id = format!("{}-{}", base_name, opened_at.timestamp());

        let (raw_log, txt_log, log_path, txt_log_path) = if config.log_to_file {
            let dir = config
                .log_dir
                .clone()
                .or_else(default_log_dir)
                .ok_or_else(|| {
                    SerialError::LogSetup(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no state directory available",
                    ))
                })?;
            std::fs::create_dir_all(&dir)?;

            let stamp = opened_at.format("%Y%m%d-%H%M%S");
            let raw_path = dir.join(format!("{stamp}-{base_name}.log"));
            let txt_path = dir.join(format!("{stamp}-{base_name}.txt"));
            let raw = std::fs::File::create(&raw_path)?;
            let txt = std::fs::File::create(&txt_path)?;
            (Some(raw), Some(txt), Some(raw_path), Some(txt_path))
        } else {
            (None, None, None, None)
        };

        let stats = Arc::new(SessionStats::default());
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (closed_tx, closed_rx) = watch::channel(false);
        let (read_tx, read_rx) = mpsc::channel(PRIMARY_CHANNEL_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        let task = SessionTask {
            id: id.clone(),
            baud: config.baud,
            stream,
            stats: Arc::clone(&stats),
            raw_log,
            txt_log,
            read_tx,
            err_tx,
            closed_tx,
            watchers: Vec::new(),
            next_watcher_id: 1,
        };
        tokio::spawn(task.run(cmd_rx));

        info!(id = %id, port = %config.port_path, baud = config.baud, "session started");

        Ok(Self {
            id,
            config,
            cmd_tx,
            closed_rx,
            stats,
            read_rx: Some(read_rx),
            err_rx: Some(err_rx),
            log_path,
            txt_log_path,
        })
    }

    /// Session identifier: port basename plus open-time stamp.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The configuration the session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Raw transcript path, when logging is enabled.
    pub fn log_path(&self) -> Option<&PathBuf> {
        self.log_path.as_ref()
    }

    /// Cleaned-text transcript path, when logging is enabled.
    pub fn txt_log_path(&self) -> Option<&PathBuf> {
        self.txt_log_path.as_ref()
    }

    /// (bytes_read, bytes_written) so far.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.stats.bytes_read.load(Ordering::Relaxed),
            self.stats.bytes_written.load(Ordering::Relaxed),
        )
    }

    /// Current DTR line state.
    pub fn dtr(&self) -> bool {
        self.stats.dtr.load(Ordering::Relaxed)
    }

    /// Current RTS line state.
    pub fn rts(&self) -> bool {
        self.stats.rts.load(Ordering::Relaxed)
    }

    /// Write data to the port, applying CR/LF translation first. Returns
    /// the number of bytes put on the wire.
    pub async fn write(&self, data: &[u8]) -> Result<usize, SerialError> {
        let translated = translate_line_endings(self.config.crlf_mode, data);
        self.request(|resp| Command::Write { data: translated, resp })
            .await?
    }

    /// Emulated BREAK: drop to baud/10, emit NULs for the duration,
    /// restore. On [`SerialError::BreakFailed`] the port is stuck at the
    /// temporary baud — close and reopen.
    pub async fn send_break(&self, duration: Duration) -> Result<(), SerialError> {
        self.request(|resp| Command::SendBreak { duration, resp })
            .await?
    }

    /// Set the DTR line.
    pub async fn set_dtr(&self, level: bool) -> Result<(), SerialError> {
        self.request(|resp| Command::SetDtr { level, resp }).await?
    }

    /// Set the RTS line.
    pub async fn set_rts(&self, level: bool) -> Result<(), SerialError> {
        self.request(|resp| Command::SetRts { level, resp }).await?
    }

    /// Take the primary RX channel. Chunks are dropped when the channel
    /// is full — the session prefers liveness to lossless delivery, and
    /// transcripts are the lossless path. The channel ends when the
    /// session closes.
    pub fn read_channel(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.read_rx.take()
    }

    /// Take the error channel carrying background read faults.
    pub fn error_channel(&mut self) -> Option<mpsc::Receiver<SerialError>> {
        self.err_rx.take()
    }

    /// Accumulate RX text until the trimmed buffer ends with one of the
    /// terminators. Timeouts and session closure return the partial
    /// content inside the error.
    pub async fn read_until(
        &self,
        timeout: Duration,
        terminators: &[&str],
    ) -> Result<String, SerialError> {
        let timeout = if timeout.is_zero() {
            DEFAULT_READ_TIMEOUT
        } else {
            timeout
        };
        debug!(id = %self.id, ?timeout, terms = terminators.len(), "read_until");

        let (tx, mut rx) = mpsc::channel(WATCHER_CHANNEL_CAPACITY);
        let (resp, ack) = oneshot::channel();
        if self.cmd_tx.send(Command::Watch { tx, resp }).await.is_err() {
            return Err(SerialError::SessionClosed {
                partial: String::new(),
            });
        }
        let Ok(watcher_id) = ack.await else {
            return Err(SerialError::SessionClosed {
                partial: String::new(),
            });
        };

        let mut closed = self.closed_rx.clone();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut accumulated = String::new();

        let outcome = loop {
            tokio::select! {
                changed = closed.changed() => {
                    if changed.is_err() || *closed.borrow() {
                        warn!(id = %self.id, "read_until aborted: session closed");
                        break Err(SerialError::SessionClosed { partial: accumulated });
                    }
                }
                _ = &mut deadline => {
                    warn!(id = %self.id, "read_until timeout");
                    break Err(SerialError::ReadTimeout {
                        partial: accumulated,
                        waited_ms: timeout.as_millis() as u64,
                    });
                }
                chunk = rx.recv() => match chunk {
                    Some(data) if !data.is_empty() => {
                        accumulated.push_str(&String::from_utf8_lossy(&data));
                        if !terminators.is_empty()
                            && ends_with_terminator(&accumulated, terminators)
                        {
                            debug!(id = %self.id, "read_until terminator matched");
                            break Ok(accumulated);
                        }
                    }
                    Some(_) => {}
                    None => break Err(SerialError::SessionClosed { partial: accumulated }),
                }
            }
        };

        let _ = self.cmd_tx.try_send(Command::Unwatch { id: watcher_id });
        outcome
    }

    /// Close the session: stop the reader, close transcripts, release
    /// the port. Idempotent.
    pub async fn close(&self) {
        if *self.closed_rx.borrow() {
            return;
        }
        let (resp, ack) = oneshot::channel();
        if self.cmd_tx.send(Command::Close { resp }).await.is_ok() {
            let _ = ack.await;
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, SerialError>>) -> Command,
    ) -> Result<Result<T, SerialError>, SerialError> {
        let (resp, ack) = oneshot::channel();
        self.cmd_tx
            .send(make(resp))
            .await
            .map_err(|_| SerialError::SessionClosed {
                partial: String::new(),
            })?;
        ack.await.map_err(|_| SerialError::SessionClosed {
            partial: String::new(),
        })
    }
}

impl ProbeTransport for Session {
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Session::write(self, data)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn read_until(
        &mut self,
        timeout: Duration,
        terminators: &[&str],
    ) -> Result<String, TransportError> {
        match Session::read_until(self, timeout, terminators).await {
            Ok(output) => Ok(output),
            Err(SerialError::ReadTimeout { partial, .. }) => {
                Err(TransportError::Timeout { partial })
            }
            Err(SerialError::SessionClosed { partial }) => {
                Err(TransportError::Closed { partial })
            }
            Err(other) => Err(TransportError::Write(other.to_string())),
        }
    }
}

struct SessionTask<S> {
    id: String,
    baud: u32,
    stream: S,
    stats: Arc<SessionStats>,
    raw_log: Option<std::fs::File>,
    txt_log: Option<std::fs::File>,
    read_tx: mpsc::Sender<Vec<u8>>,
    err_tx: mpsc::Sender<SerialError>,
    closed_tx: watch::Sender<bool>,
    watchers: Vec<(u64, mpsc::Sender<Vec<u8>>)>,
    next_watcher_id: u64,
}

impl<S: ConsoleTransport> SessionTask<S> {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        // Lines idle high on a live console; failures are non-fatal.
        if self.stream.set_dtr(true).is_ok() {
            self.stats.dtr.store(true, Ordering::Relaxed);
        }
        if self.stream.set_rts(true).is_ok() {
            self.stats.rts.store(true, Ordering::Relaxed);
        }

        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Write { data, resp }) => {
                        let _ = resp.send(self.write_port(&data).await);
                    }
                    Some(Command::SendBreak { duration, resp }) => {
                        let _ = resp.send(self.emulate_break(duration).await);
                    }
                    Some(Command::SetDtr { level, resp }) => {
                        let result = self.stream.set_dtr(level).map_err(|e| {
                            SerialError::WriteFailed(format!("set DTR: {e}"))
                        });
                        if result.is_ok() {
                            self.stats.dtr.store(level, Ordering::Relaxed);
                            debug!(id = %self.id, dtr = level, "line state");
                        }
                        let _ = resp.send(result);
                    }
                    Some(Command::SetRts { level, resp }) => {
                        let result = self.stream.set_rts(level).map_err(|e| {
                            SerialError::WriteFailed(format!("set RTS: {e}"))
                        });
                        if result.is_ok() {
                            self.stats.rts.store(level, Ordering::Relaxed);
                            debug!(id = %self.id, rts = level, "line state");
                        }
                        let _ = resp.send(result);
                    }
                    Some(Command::Watch { tx, resp }) => {
                        let id = self.next_watcher_id;
                        self.next_watcher_id += 1;
                        self.watchers.push((id, tx));
                        let _ = resp.send(id);
                    }
                    Some(Command::Unwatch { id }) => {
                        self.watchers.retain(|(wid, _)| *wid != id);
                    }
                    Some(Command::Close { resp }) => {
                        let _ = resp.send(());
                        break;
                    }
                    // All handles dropped.
                    None => break,
                },
                read = self.stream.read(&mut buf) => match read {
                    Ok(0) => {
                        let _ = self.err_tx.try_send(SerialError::ReadIo("end of stream".into()));
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Ok(n) => self.deliver(&buf[..n]),
                    Err(e) => {
                        let _ = self.err_tx.try_send(SerialError::ReadIo(e.to_string()));
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        }

        self.raw_log.take();
        self.txt_log.take();
        let _ = self.closed_tx.send(true);
        info!(id = %self.id, "session closed");
    }

    /// Forward one OS read to transcripts, the primary channel and every
    /// watcher. Chunks are never split; full queues drop the chunk.
    fn deliver(&mut self, data: &[u8]) {
        if let Some(log) = self.raw_log.as_mut() {
            if let Err(e) = log.write_all(data) {
                warn!(id = %self.id, "raw transcript write failed: {e}");
            }
        }
        if let Some(log) = self.txt_log.as_mut() {
            let cleaned = clean_for_evidence(data);
            if let Err(e) = log.write_all(cleaned.as_bytes()) {
                warn!(id = %self.id, "text transcript write failed: {e}");
            }
        }

        let _ = self.read_tx.try_send(data.to_vec());
        self.watchers
            .retain(|(_, tx)| !matches!(tx.try_send(data.to_vec()), Err(mpsc::error::TrySendError::Closed(_))));

        self.stats
            .bytes_read
            .fetch_add(data.len() as u64, Ordering::Relaxed);
    }

    async fn write_port(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        self.stream
            .write_all(data)
            .await
            .map_err(|e| SerialError::WriteFailed(e.to_string()))?;
        self.stream
            .flush()
            .await
            .map_err(|e| SerialError::WriteFailed(e.to_string()))?;

        if let Some(log) = self.raw_log.as_mut() {
            if let Err(e) = log.write_all(data) {
                warn!(id = %self.id, "raw transcript write failed: {e}");
            }
        }

        self.stats
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        debug!(id = %self.id, wrote = data.len(), "write complete");
        Ok(data.len())
    }

    /// NULs at a tenth of the configured baud approximate a line BREAK.
    /// If the restore fails the port stays at the low rate; callers must
    /// close and reopen.
    async fn emulate_break(&mut self, duration: Duration) -> Result<(), SerialError> {
        let low = (self.baud / 10).max(1);
        self.stream
            .set_baud(low)
            .map_err(|e| SerialError::BreakFailed(format!("lower baud: {e}")))?;

        let nulls = vec![0u8; break_null_count(duration)];
        if let Err(e) = self.stream.write_all(&nulls).await {
            warn!(id = %self.id, "break write failed: {e}");
        }
        let _ = self.stream.flush().await;

        self.stream
            .set_baud(self.baud)
            .map_err(|e| SerialError::BreakFailed(format!("restore baud: {e}")))?;
        info!(id = %self.id, ?duration, "break sent");
        Ok(())
    }
}

fn to_data_bits(bits: u8) -> tokio_serial::DataBits {
    match bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    }
}

fn to_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

fn to_stop_bits(bits: u8) -> tokio_serial::StopBits {
    if bits == 2 {
        tokio_serial::StopBits::Two
    } else {
        tokio_serial::StopBits::One
    }
}

/// Platform transcript directory: state dir where the OS has one, local
/// data dir otherwise.
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("lanscout").join("console"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    use tokio::io::DuplexStream;

    /// In-memory transport recording control-line and baud changes.
    struct TestTransport {
        io: DuplexStream,
        bauds: Arc<Mutex<Vec<u32>>>,
    }

    impl TestTransport {
        fn pair() -> (Self, DuplexStream, Arc<Mutex<Vec<u32>>>) {
            let (near, far) = tokio::io::duplex(64 * 1024);
            let bauds = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    io: near,
                    bauds: Arc::clone(&bauds),
                },
                far,
                bauds,
            )
        }
    }

    impl AsyncRead for TestTransport {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.io).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for TestTransport {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.io).poll_write(cx, buf)
        }

        fn poll_flush(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.io).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.io).poll_shutdown(cx)
        }
    }

    impl ConsoleTransport for TestTransport {
        fn set_dtr(&mut self, _level: bool) -> std::io::Result<()> {
            Ok(())
        }

        fn set_rts(&mut self, _level: bool) -> std::io::Result<()> {
            Ok(())
        }

        fn set_baud(&mut self, baud: u32) -> std::io::Result<()> {
            self.bauds.lock().unwrap().push(baud);
            Ok(())
        }
    }

    fn test_session(crlf: CrlfMode) -> (Session, DuplexStream, Arc<Mutex<Vec<u32>>>) {
        let (near, far, bauds) = TestTransport::pair();
        let mut config = SessionConfig::new("/dev/ttyTEST0", 9600);
        config.crlf_mode = crlf;
        let session = Session::attach(near, config).unwrap();
        (session, far, bauds)
    }

    async fn read_exact_bytes(far: &mut DuplexStream, n: usize) -> Vec<u8> {
        let mut out = vec![0u8; n];
        tokio::time::timeout(Duration::from_secs(2), far.read_exact(&mut out))
            .await
            .expect("timed out waiting for wire bytes")
            .expect("far end read");
        out
    }

    #[test]
    fn crlf_mode_expands_lone_newlines_only() {
        assert_eq!(
            translate_line_endings(CrlfMode::Crlf, b"a\nb\r\nc"),
            b"a\r\nb\r\nc".to_vec()
        );
        assert_eq!(
            translate_line_endings(CrlfMode::Cr, b"a\nb\n"),
            b"a\rb\r".to_vec()
        );
        assert_eq!(
            translate_line_endings(CrlfMode::Lf, b"a\nb\r\n"),
            b"a\nb\r\n".to_vec()
        );
    }

    #[test]
    fn break_count_rounds_up() {
        assert_eq!(break_null_count(Duration::from_millis(250)), 25);
        assert_eq!(break_null_count(Duration::from_millis(251)), 26);
        assert_eq!(break_null_count(Duration::from_millis(1)), 1);
        assert_eq!(break_null_count(Duration::ZERO), 1);
    }

    #[test]
    fn terminator_matching_trims_both_sides() {
        assert!(ends_with_terminator("show ver\nR1# ", &["#", ">"]));
        assert!(!ends_with_terminator("loading...", &["#", ">"]));
        // A terminator that trims to empty never matches.
        assert!(!ends_with_terminator("anything", &["\n"]));
        assert!(!ends_with_terminator("anything", &[]));
    }

    #[test]
    fn default_config_is_8n1() {
        let config = SessionConfig::new("/dev/ttyUSB0", 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.crlf_mode, CrlfMode::Crlf);
        assert!(!config.log_to_file);
    }

    #[tokio::test]
    async fn write_translates_and_counts() {
        let (session, mut far, _) = test_session(CrlfMode::Crlf);

        let n = session.write(b"a\nb\r\nc").await.unwrap();
        assert_eq!(n, 7);
        assert_eq!(read_exact_bytes(&mut far, 7).await, b"a\r\nb\r\nc".to_vec());

        let (_, written) = session.stats();
        assert_eq!(written, 7);
        session.close().await;
    }

    #[tokio::test]
    async fn read_until_returns_on_terminator() {
        let (session, mut far, _) = test_session(CrlfMode::Lf);

        // Let the watcher register before the device talks.
        let reader = session.read_until(Duration::from_secs(2), &["#", ">"]);
        let feeder = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            far.write_all(b"banner line\nR1#").await.unwrap();
        };

        let (output, _) = tokio::join!(reader, feeder);
        assert!(output.unwrap().ends_with("R1#"));
        session.close().await;
    }

    #[tokio::test]
    async fn read_until_timeout_preserves_partial() {
        let (session, mut far, _) = test_session(CrlfMode::Lf);

        let reader = session.read_until(Duration::from_millis(500), &["#"]);
        let feeder = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            far.write_all(b"no prompt here").await.unwrap();
        };

        let (err, _) = tokio::join!(reader, feeder);
        match err.unwrap_err() {
            SerialError::ReadTimeout { partial, .. } => {
                assert!(partial.contains("no prompt here"))
            }
            other => panic!("expected ReadTimeout, got {other:?}"),
        }
        session.close().await;
    }

    #[tokio::test]
    async fn break_emits_nulls_at_low_baud() {
        let (session, mut far, bauds) = test_session(CrlfMode::Lf);

        session.send_break(Duration::from_millis(250)).await.unwrap();

        let nulls = read_exact_bytes(&mut far, 25).await;
        assert!(nulls.iter().all(|&b| b == 0));
        assert_eq!(*bauds.lock().unwrap(), vec![960, 9600]);
        session.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_later_writes() {
        let (session, _far, _) = test_session(CrlfMode::Lf);

        session.close().await;
        session.close().await;

        let err = session.write(b"late").await.unwrap_err();
        assert!(matches!(err, SerialError::SessionClosed { .. }));

        let err = session
            .read_until(Duration::from_millis(100), &["#"])
            .await
            .unwrap_err();
        assert!(matches!(err, SerialError::SessionClosed { .. }));
    }

    #[tokio::test]
    async fn read_channel_carries_chunks_in_order() {
        let (mut session, mut far, _) = test_session(CrlfMode::Lf);
        let mut rx = session.read_channel().expect("primary channel");
        assert!(session.read_channel().is_none(), "channel is take-once");

        far.write_all(b"first").await.unwrap();
        let chunk = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, b"first".to_vec());

        let (read, _) = session.stats();
        assert!(read >= 5);
        session.close().await;
    }

    #[tokio::test]
    async fn transcripts_mirror_traffic() {
        let dir = std::env::temp_dir().join(format!(
            "lanscout-session-test-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let (near, mut far, _) = TestTransport::pair();
        let mut config = SessionConfig::new("/dev/ttyTEST1", 9600);
        config.crlf_mode = CrlfMode::Lf;
        config.log_to_file = true;
        config.log_dir = Some(dir.clone());
        let session = Session::attach(near, config).unwrap();

        let raw_path = session.log_path().cloned().expect("raw log path");
        let txt_path = session.txt_log_path().cloned().expect("txt log path");

        session.write(b"show version\n").await.unwrap();
        far.write_all(b"Cisco IOS Software\x01\n").await.unwrap();

        // Wait until the reader has delivered the RX chunk.
        for _ in 0..50 {
            if session.stats().0 > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        session.close().await;

        let raw = std::fs::read(&raw_path).unwrap();
        let raw_text = String::from_utf8_lossy(&raw);
        assert!(raw_text.contains("show version"));
        assert!(raw_text.contains("Cisco IOS Software"));

        let txt = std::fs::read_to_string(&txt_path).unwrap();
        assert!(txt.contains("Cisco IOS Software \n"), "control byte cleaned: {txt:?}");
        assert!(!txt.contains("show version"), "txt log holds RX only");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn watchers_fan_out_to_concurrent_readers() {
        let (session, mut far, _) = test_session(CrlfMode::Lf);

        let first = session.read_until(Duration::from_secs(2), &["#"]);
        let second = session.read_until(Duration::from_secs(2), &["#"]);

        // Give both watchers a moment to register before data arrives.
        let feeder = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            far.write_all(b"\xE5\x90\x8Cstep\nR1#").await.unwrap();
        };

        let (a, b, _) = tokio::join!(first, second, feeder);
        assert!(a.unwrap().ends_with("R1#"));
        assert!(b.unwrap().ends_with("R1#"));
        session.close().await;
    }
}
