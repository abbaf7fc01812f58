//! Frame reassembly and display line buffering
//!
//! Network reads do not respect line boundaries. [`FrameDecoder`] holds back
//! the incomplete trailing line of every read (as raw bytes, so a multi-byte
//! character split across reads survives) and decodes each completed line.
//! [`LineBuffer`] does the same for the delta text itself.

use tracing::debug;

use crate::types::StreamChunk;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// A decoded stream line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Non-empty delta text
    Delta(String),
    /// The terminating sentinel
    Done,
    /// A `data:` line that could not be decoded; skipped, never fatal
    Malformed(String),
}

/// Reassembles line-oriented frames from arbitrary byte chunks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read; returns the frames completed by it
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(frame) = decode_line(&line[..line.len() - 1]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Decode whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }

    /// Bytes held back waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<Frame> {
    let Ok(line) = std::str::from_utf8(raw) else {
        return Some(Frame::Malformed("invalid UTF-8".to_string()));
    };
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // Comments (`: keep-alive`) and `event:`/`id:` fields carry no delta
    let payload = line.strip_prefix(DATA_PREFIX)?.trim_start();
    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk.delta_text().map(|text| Frame::Delta(text.to_string())),
        Err(e) => {
            debug!("Skipping undecodable frame: {}", e);
            Some(Frame::Malformed(e.to_string()))
        }
    }
}

/// Splits accumulated delta text into completed display lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append delta text; returns every line it completed
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.partial.push_str(delta);
        if !self.partial.contains('\n') {
            return Vec::new();
        }

        let mut lines: Vec<String> = self.partial.split('\n').map(str::to_string).collect();
        self.partial = lines.pop().unwrap_or_default();
        lines
    }

    /// Final flush of a trailing partial line, if it holds anything visible
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.partial);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}
