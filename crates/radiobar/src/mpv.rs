//! mpv-backed playback engine.
//!
//! Architecture:
//!
//! ```text
//!   MpvEngine (PlaybackEngine) ──PlayerCommand──► MpvPlayer task
//!                                                   │ owns MpvDriver
//!                                                   ├── writer_task ← PendingRequest → socket
//!                                                   └── reader_task → responses / MpvEvent
//!   MpvPlayer ──ServiceEvent::PlaybackFailed──► RadioService
//! ```
//!
//! `MpvEngine` only enqueues commands, so the directory never waits on IPC.
//! Failures that happen after a start was accepted (mpv missing, loadfile
//! rejected, `end-file` with `reason: error`) travel back to the service.
//! An `end-file` is only blamed on the current stream when its
//! `playlist_entry_id` is the one mpv assigned to that stream.
//!
//! Platform notes:
//! - Unix:   Unix domain sockets
//! - Windows: Named pipes `\\.\pipe\<name>`

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use radiobar_core::{PlaybackEngine, PlaybackError, ServiceEvent};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// For an `end-file` event caused by a playback error, the error text.
    pub fn end_file_error(&self) -> Option<String> {
        if self.event_name()? != "end-file" || self.raw.get("reason")?.as_str()? != "error" {
            return None;
        }
        let detail = self
            .raw
            .get("file_error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        Some(format!("mpv: {}", detail))
    }

    pub fn playlist_entry_id(&self) -> Option<u64> {
        self.raw.get("playlist_entry_id")?.as_u64()
    }
}

// ── IPC handle ────────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Returns the playlist entry id when mpv reports one (0.38+).
    pub async fn load_stream(&self, url: &Url) -> anyhow::Result<Option<u64>> {
        debug!("mpv: loadfile {}", url);
        let reply = self.send(json!(["loadfile", url.as_str(), "replace"])).await?;
        Ok(reply
            .get("data")
            .and_then(|d| d.get("playlist_entry_id"))
            .and_then(Value::as_u64))
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "mute", muted])).await?;
        Ok(())
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process and its IPC connection.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: radiobar_core::platform::mpv_socket_name(),
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        match self.process.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                warn!("mpv process exited: {}", status);
                false
            }
            Some(Err(e)) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
            None => false,
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self, muted: bool) -> anyhow::Result<()> {
        let mpv_binary = radiobar_core::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        info!("mpv: spawning {}", mpv_binary.display());

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--quiet")
            .arg(radiobar_core::platform::mpv_socket_arg())
            .arg(format!("--mute={}", if muted { "yes" } else { "no" }))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        muted: bool,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process(muted)?;

        // Wait for socket to appear
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        muted: bool,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn_process(muted)?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel.  Writer inserts, reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error");
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    }
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    let _ = event_tx.send(MpvEvent { raw: val }).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── PlaybackEngine over mpv ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Start(Url),
    Stop,
    SetMuted(bool),
}

/// The directory-facing half: a queue into the player task.
pub struct MpvEngine {
    tx: mpsc::Sender<PlayerCommand>,
}

impl MpvEngine {
    /// Spawn the player task.  It exits, killing mpv, once the engine is dropped.
    pub fn spawn(
        service_tx: mpsc::Sender<ServiceEvent>,
        muted: bool,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let player = MpvPlayer::new(service_tx, muted);
        let handle = tokio::spawn(player.run(rx));
        (Self { tx }, handle)
    }

    fn enqueue(&self, cmd: PlayerCommand) -> Result<(), PlaybackError> {
        self.tx.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                PlaybackError::Unavailable("player queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                PlaybackError::Unavailable("player task has exited".to_string())
            }
        })
    }
}

impl PlaybackEngine for MpvEngine {
    fn start_stream(&mut self, url: &Url) -> Result<(), PlaybackError> {
        self.enqueue(PlayerCommand::Start(url.clone()))
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.enqueue(PlayerCommand::Stop)
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), PlaybackError> {
        self.enqueue(PlayerCommand::SetMuted(muted))
    }
}

/// The stream mpv was last told to play.
#[derive(Debug, Clone, PartialEq)]
struct CurrentStream {
    url: Url,
    /// Learned from the loadfile reply, or from the first `start-file` after it.
    entry_id: Option<u64>,
}

impl CurrentStream {
    fn owns(&self, evt: &MpvEvent) -> bool {
        match (self.entry_id, evt.playlist_entry_id()) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }
}

/// Owns the mpv driver; runs on its own task.
struct MpvPlayer {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    mpv_tx: mpsc::Sender<MpvEvent>,
    mpv_rx: mpsc::Receiver<MpvEvent>,
    service_tx: mpsc::Sender<ServiceEvent>,
    current: Option<CurrentStream>,
    muted: bool,
}

impl MpvPlayer {
    fn new(service_tx: mpsc::Sender<ServiceEvent>, muted: bool) -> Self {
        let (mpv_tx, mpv_rx) = mpsc::channel(64);
        Self {
            driver: MpvDriver::new(),
            handle: None,
            mpv_tx,
            mpv_rx,
            service_tx,
            current: None,
            muted,
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<PlayerCommand>) {
        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(evt) = self.mpv_rx.recv() => self.handle_mpv_event(evt).await,
            }
        }
        info!("mpv player: engine dropped, shutting down");
        self.driver.kill().await;
    }

    async fn handle_command(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::Start(url) => {
                self.current = Some(CurrentStream {
                    url: url.clone(),
                    entry_id: None,
                });
                let result = match self.ensure_handle().await {
                    Ok(handle) => handle.load_stream(&url).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(entry_id) => {
                        // Everything queued before the reply belongs to earlier files.
                        self.discard_queued_events();
                        if let Some(current) = self.current.as_mut() {
                            current.entry_id = entry_id;
                        }
                    }
                    Err(e) => self.report_failure(url, e.to_string()).await,
                }
            }
            PlayerCommand::Stop => {
                self.current = None;
                if let Some(handle) = &self.handle {
                    if let Err(e) = handle.stop().await {
                        warn!("mpv: stop failed: {}", e);
                    }
                }
            }
            PlayerCommand::SetMuted(muted) => {
                self.muted = muted;
                // Applied at spawn time when mpv is not running yet.
                if let Some(handle) = &self.handle {
                    if let Err(e) = handle.set_muted(muted).await {
                        warn!("mpv: set mute failed: {}", e);
                    }
                }
            }
        }
    }

    fn discard_queued_events(&mut self) {
        while let Ok(evt) = self.mpv_rx.try_recv() {
            debug!("mpv: dropping stale event {:?}", evt.event_name());
        }
    }

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.entry_id.is_none() && evt.event_name() == Some("start-file") {
            current.entry_id = evt.playlist_entry_id();
        }
        if let Some(reason) = evt.end_file_error() {
            if current.owns(&evt) {
                let url = current.url.clone();
                self.report_failure(url, reason).await;
            } else {
                debug!(
                    "mpv: ignoring end-file for entry {:?}, playing {:?}",
                    evt.playlist_entry_id(),
                    current.entry_id
                );
            }
        }
    }

    async fn report_failure(&mut self, stream_url: Url, reason: String) {
        warn!("mpv: playback of {} failed: {}", stream_url, reason);
        if self.current.as_ref().map(|c| &c.url) == Some(&stream_url) {
            self.current = None;
        }
        let _ = self
            .service_tx
            .send(ServiceEvent::PlaybackFailed { stream_url, reason })
            .await;
    }

    async fn ensure_handle(&mut self) -> anyhow::Result<MpvHandle> {
        if let Some(handle) = &self.handle {
            if self.driver.process_alive() {
                return Ok(handle.clone());
            }
            warn!("mpv: process died, respawning");
            self.handle = None;
        }
        let handle = self
            .driver
            .spawn_and_connect(self.muted, self.mpv_tx.clone())
            .await?;
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}
