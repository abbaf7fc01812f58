//! GenerationSession: one streamed request, from submit to extraction
//!
//! The session state is driven by a pure transition function, in the same
//! shape as the orchestration state machine: invalid events move the session
//! to `Failed` instead of panicking, and terminal states absorb everything.

use buildora_core::{BuildoraError, Result};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::extract::{self, ExtractedFileSet};
use crate::frames::{Frame, FrameDecoder, LineBuffer};
use crate::types::{LogLine, LogSource};

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SessionState {
    Idle,
    Streaming,
    Draining,
    Done,
    Failed { error: String },
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. } | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
            Self::Draining => write!(f, "draining"),
            Self::Done => write!(f, "done"),
            Self::Failed { error } => write!(f, "failed: {}", error),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Inputs that move a session between states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Request accepted, first bytes expected
    Start,
    /// Sentinel frame seen or the response body ended
    StreamEnded,
    /// Buffers flushed
    Drained,
    /// Transport or API fault
    Fault { message: String },
    /// User asked to stop
    Cancel,
}

/// Pure state transition
pub fn transition(state: SessionState, event: SessionEvent) -> SessionState {
    match (state, event) {
        (state, _) if state.is_terminal() => state,

        (_, SessionEvent::Cancel) => SessionState::Cancelled,
        (_, SessionEvent::Fault { message }) => SessionState::Failed { error: message },

        (SessionState::Idle, SessionEvent::Start) => SessionState::Streaming,
        (SessionState::Streaming, SessionEvent::StreamEnded) => SessionState::Draining,
        (SessionState::Draining, SessionEvent::Drained) => SessionState::Done,

        (state, event) => SessionState::Failed {
            error: format!("Invalid session transition from {} on {:?}", state, event),
        },
    }
}

/// Per-request generation state
///
/// Created for one submitted instruction and dropped once its output has been
/// applied or the request was cancelled.
#[derive(Debug)]
pub struct GenerationSession {
    prompt: String,
    state: SessionState,
    raw: String,
    frames: FrameDecoder,
    lines: LineBuffer,
    log: Vec<LogLine>,
    skipped: Vec<BuildoraError>,
}

impl GenerationSession {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            state: SessionState::Idle,
            raw: String::new(),
            frames: FrameDecoder::new(),
            lines: LineBuffer::new(),
            log: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// All delta text received so far
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn log(&self) -> &[LogLine] {
        &self.log
    }

    pub fn skipped_frames(&self) -> usize {
        self.skipped.len()
    }

    /// Why each skipped frame was dropped, in stream order
    pub fn skipped(&self) -> &[BuildoraError] {
        &self.skipped
    }

    fn apply(&mut self, event: SessionEvent) {
        let previous = std::mem::replace(&mut self.state, SessionState::Idle);
        self.state = transition(previous, event);
        debug!(state = %self.state, "Generation session state");
    }

    fn push_log(&mut self, source: LogSource, text: String) {
        if self.state == SessionState::Cancelled {
            return;
        }
        self.log.push(LogLine {
            timestamp: Utc::now(),
            source,
            text,
        });
    }

    /// Append a progress line to the session log
    pub fn status(&mut self, message: impl Into<String>) {
        self.push_log(LogSource::Status, message.into());
    }

    /// Idle to Streaming
    pub fn start(&mut self) {
        self.apply(SessionEvent::Start);
    }

    /// Request cooperative cancellation; everything after this is discarded
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            info!("Generation cancelled");
        }
        self.apply(SessionEvent::Cancel);
    }

    /// Record a fault and move to Failed
    pub fn fail(&mut self, error: &BuildoraError) {
        self.status(format!("ERROR: {}", error));
        self.apply(SessionEvent::Fault {
            message: error.to_string(),
        });
    }

    /// Feed one network read
    ///
    /// Returns `true` once the sentinel frame has been seen.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        if self.state != SessionState::Streaming {
            return false;
        }
        let frames = self.frames.push(bytes);
        self.accept_frames(frames)
    }

    fn accept_frames(&mut self, frames: impl IntoIterator<Item = Frame>) -> bool {
        for frame in frames {
            match frame {
                Frame::Delta(text) => {
                    self.raw.push_str(&text);
                    for line in self.lines.push(&text) {
                        self.push_log(LogSource::Stream, line);
                    }
                }
                Frame::Done => return true,
                Frame::Malformed(reason) => {
                    let err = BuildoraError::MalformedFrame(reason);
                    debug!("Skipped frame: {}", err);
                    self.skipped.push(err);
                }
            }
        }
        false
    }

    /// Streaming to Done, flushing both buffers on the way
    ///
    /// A stream that carried no delta text at all fails with `Api`.
    pub fn finish(&mut self) -> Result<()> {
        if self.state != SessionState::Streaming {
            return match &self.state {
                SessionState::Cancelled => Err(BuildoraError::Cancelled),
                other => Err(BuildoraError::Other(format!("Cannot finish a {} session", other))),
            };
        }

        self.apply(SessionEvent::StreamEnded);
        if let Some(frame) = self.frames.finish() {
            self.accept_frames([frame]);
        }
        if let Some(line) = self.lines.finish() {
            self.push_log(LogSource::Stream, line);
        }

        if self.raw.trim().is_empty() {
            let error = BuildoraError::Api("no content returned by the model".to_string());
            self.fail(&error);
            return Err(error);
        }

        self.apply(SessionEvent::Drained);
        self.status("Stream complete.");
        Ok(())
    }

    /// Drive a byte stream to completion
    ///
    /// Cancellation is checked at every read boundary. A read that arrives
    /// after cancellation was requested is dropped unseen.
    pub async fn consume<S, B, E>(&mut self, stream: S, cancel: &CancellationToken) -> Result<()>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        if self.state == SessionState::Idle {
            self.start();
        }
        let mut stream = std::pin::pin!(stream);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };

            let Some(next) = next else {
                self.cancel();
                return Err(BuildoraError::Cancelled);
            };
            if cancel.is_cancelled() {
                self.cancel();
                return Err(BuildoraError::Cancelled);
            }

            match next {
                Some(Ok(bytes)) => {
                    if self.feed(bytes.as_ref()) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    let error = BuildoraError::Network(format!("Stream interrupted: {}", e));
                    warn!("{}", error);
                    self.fail(&error);
                    return Err(error);
                }
                None => break,
            }
        }

        self.finish()
    }

    /// Extract `expected` files from the text received so far
    ///
    /// A cancelled session yields an empty set.
    pub fn extract(&self, expected: &[&str]) -> ExtractedFileSet {
        match self.state {
            SessionState::Cancelled => ExtractedFileSet::default(),
            _ => extract::extract(&self.raw, expected),
        }
    }
}
