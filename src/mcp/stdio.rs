//! Newline-delimited JSON-RPC over a byte stream pair (normally stdin/stdout)
//!
//! A single reader task owns the input. Each non-blank line produces exactly one
//! response line, written and flushed before the next line is read. The startup path
//! can wait on a one-shot gate that opens after the first handled line.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::mcp::{
    rpc::{JsonRpcRequest, JsonRpcResponse, RpcError},
    server::RpcDispatcher,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stdio transport i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("stdio reader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    PreInitializing,
    Running,
    Stopping,
    Terminated,
}

/// How a wait on the initialization gate ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Opened,
    /// The reader loop ended before anything opened the gate.
    Closed,
    TimedOut,
}

/// Lifecycle flags of one transport. `running` only goes true to false and
/// `initialized` only goes false to true.
#[derive(Debug)]
pub struct TransportState {
    running: AtomicBool,
    initialized: AtomicBool,
    phase: watch::Sender<Phase>,
    gate: Mutex<Option<oneshot::Sender<()>>>,
}

impl TransportState {
    fn new(gate: oneshot::Sender<()>) -> Self {
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            running: AtomicBool::new(true),
            initialized: AtomicBool::new(false),
            phase,
            gate: Mutex::new(Some(gate)),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that performed the transition.
    pub fn mark_initialized(&self) -> bool {
        let flipped = self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if flipped {
            self.release_gate();
        }
        flipped
    }

    fn release_gate(&self) {
        if let Some(gate) = self.gate.lock().take() {
            // The waiter may have given up already.
            let _ = gate.send(());
        }
    }

    fn request_stop(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.phase.send_if_modified(|phase| {
            if *phase == Phase::Terminated || *phase == Phase::Stopping {
                return false;
            }
            *phase = Phase::Stopping;
            true
        });
        was_running
    }

    fn enter(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    fn terminate(&self) {
        self.running.store(false, Ordering::SeqCst);
        // Dropping an unfired sender wakes the waiter with `Closed`.
        self.gate.lock().take();
        self.enter(Phase::Terminated);
    }
}

pub struct StdioServer {
    dispatcher: RpcDispatcher,
    state: Arc<TransportState>,
    gate: oneshot::Receiver<()>,
}

impl StdioServer {
    pub fn new(dispatcher: RpcDispatcher) -> Self {
        let (sender, gate) = oneshot::channel();
        Self {
            dispatcher,
            state: Arc::new(TransportState::new(sender)),
            gate,
        }
    }

    pub fn state(&self) -> Arc<TransportState> {
        self.state.clone()
    }

    /// Warms the dispatch path with an `initialize` and a `getTools` call. Responses
    /// are discarded and failures only logged.
    pub async fn pre_initialize(&self) {
        let requests = [
            JsonRpcRequest::new("initialize", None, "init"),
            JsonRpcRequest::new("getTools", None, "init-tools"),
        ];

        for request in requests {
            let method = request.method.clone();
            let dispatcher = self.dispatcher.clone();
            let task = tokio::spawn(async move { dispatcher.handle_request(request).await });

            match task.await {
                Ok(response) => match response.error {
                    Some(error) => warn!(
                        method = %method,
                        code = error.code,
                        message = %error.message,
                        "pre-initialization request failed"
                    ),
                    None => debug!(method = %method, "pre-initialization request completed"),
                },
                Err(err) => warn!(method = %method, error = %err, "pre-initialization request panicked"),
            }
        }
    }

    /// Pre-initializes, then spawns the reader loop over `reader`/`writer`.
    pub async fn start<R, W>(self, reader: R, writer: W) -> StdioHandle
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.state.enter(Phase::PreInitializing);
        self.pre_initialize().await;

        // A stop requested during pre-initialization wins.
        self.state.phase.send_if_modified(|phase| {
            if *phase != Phase::PreInitializing {
                return false;
            }
            *phase = Phase::Running;
            true
        });
        info!("stdio transport running");

        let reader_loop = ReaderLoop {
            reader,
            writer,
            dispatcher: self.dispatcher,
            state: self.state.clone(),
        };
        let task = tokio::spawn(reader_loop.run());

        StdioHandle {
            state: self.state,
            gate: Some(self.gate),
            task,
        }
    }
}

pub struct StdioHandle {
    state: Arc<TransportState>,
    gate: Option<oneshot::Receiver<()>>,
    task: JoinHandle<Result<(), TransportError>>,
}

impl StdioHandle {
    pub fn state(&self) -> &TransportState {
        &self.state
    }

    /// Asks the reader loop to exit before its next read. A line that is already
    /// being read is still handled.
    pub fn stop(&self) {
        if self.state.request_stop() {
            info!("stdio transport stop requested");
        }
    }

    /// Marks the peer initialized without waiting for traffic.
    pub fn mark_initialized(&self) -> bool {
        self.state.mark_initialized()
    }

    /// Waits for the first handled line, bounded by `timeout`. Only the first call
    /// observes the gate; later calls report the current state.
    pub async fn wait_until_initialized(&mut self, timeout: Duration) -> GateOutcome {
        let Some(gate) = self.gate.take() else {
            return if self.state.is_initialized() {
                GateOutcome::Opened
            } else {
                GateOutcome::Closed
            };
        };

        match tokio::time::timeout(timeout, gate).await {
            Ok(Ok(())) => GateOutcome::Opened,
            Ok(Err(_)) => GateOutcome::Closed,
            Err(_) => GateOutcome::TimedOut,
        }
    }

    /// Waits for the reader loop to finish.
    pub async fn join(self) -> Result<(), TransportError> {
        self.task.await?
    }
}

struct ReaderLoop<R, W> {
    reader: R,
    writer: W,
    dispatcher: RpcDispatcher,
    state: Arc<TransportState>,
}

impl<R, W> ReaderLoop<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn run(mut self) -> Result<(), TransportError> {
        let outcome = self.read_lines().await;
        self.state.terminate();

        match &outcome {
            Ok(()) => info!("stdio transport terminated"),
            Err(err) => error!(error = %err, "stdio transport terminated on i/o failure"),
        }
        outcome
    }

    async fn read_lines(&mut self) -> Result<(), TransportError> {
        let mut buffer = Vec::new();

        loop {
            if !self.state.is_running() {
                info!("stdio reader observed stop request");
                return Ok(());
            }

            buffer.clear();
            if self.reader.read_until(b'\n', &mut buffer).await? == 0 {
                info!("stdin closed");
                return Ok(());
            }

            // Invalid UTF-8 is replaced so the line still gets a parse error back.
            let line = String::from_utf8_lossy(&buffer);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            self.process(trimmed.to_string()).await?;
        }
    }

    /// Dispatches on a separate task so a panicking handler cannot take the loop down.
    async fn process(&mut self, line: String) -> Result<(), TransportError> {
        debug!(line = %line, "stdio request received");

        let dispatcher = self.dispatcher.clone();
        let request_line = line.clone();
        let task = tokio::spawn(async move { dispatcher.handle_line(&request_line).await });

        match task.await {
            Ok(response) => {
                if self.state.mark_initialized() {
                    info!("first stdio request handled, peer initialized");
                }
                debug!(line = %response, "stdio response sent");
                write_line(&mut self.writer, &response).await?;
            }
            Err(err) => {
                error!(error = %err, "stdio dispatch failed");
                if self.state.is_initialized() {
                    let response = JsonRpcResponse::error(
                        recover_id(&line),
                        RpcError::internal_error(err.to_string()),
                    );
                    write_line(&mut self.writer, &response.to_line()).await?;
                } else {
                    // No confirmed peer yet: unblock startup but stay silent.
                    self.state.release_gate();
                }
            }
        }
        Ok(())
    }
}

fn recover_id(line: &str) -> Value {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|payload| payload.get("id").cloned())
        .unwrap_or(Value::Null)
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[derive(Debug, Clone, Copy)]
pub struct StdioOptions {
    /// Wait on the gate when true, otherwise mark initialized right away.
    pub interactive: bool,
    pub init_timeout: Duration,
}

/// Serves `reader`/`writer` (stdin/stdout in the binary) until the input closes or
/// fails, applying the startup policy from `options`.
pub async fn serve_stdio<R, W>(
    dispatcher: RpcDispatcher,
    options: StdioOptions,
    reader: R,
    writer: W,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let server = StdioServer::new(dispatcher);
    let mut handle = server.start(reader, writer).await;

    if options.interactive {
        match handle.wait_until_initialized(options.init_timeout).await {
            GateOutcome::Opened => info!("stdio peer initialized"),
            GateOutcome::Closed => info!("stdin closed before the first request"),
            GateOutcome::TimedOut => warn!(
                timeout_secs = options.init_timeout.as_secs(),
                "no stdio request within the initialization timeout, continuing"
            ),
        }
    } else {
        handle.mark_initialized();
        info!("no interactive stdio peer detected, marked initialized");
    }

    handle.join().await
}
