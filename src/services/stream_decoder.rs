//! Incremental decoder for `data: ` framed completion streams.
//!
//! Bytes arrive in arbitrary chunks. Decoding state (an incomplete UTF-8
//! sequence and the unterminated tail line) carries over between reads, so the
//! produced deltas do not depend on where the transport split the body.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};

use crate::error::ChatError;
use crate::models::StreamResponse;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

enum Line {
    Delta(String),
    Done,
    Skip,
}

/// Push-based decoder. Feed chunks with [`SseDecoder::push`], call
/// [`SseDecoder::finish`] at end of input.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    buffer: String,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `[DONE]` has been seen or input has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        self.pending.extend_from_slice(chunk);
        self.decode_pending();
        self.drain_lines()
    }

    /// Flushes what is left at end of input. A trailing line without a newline
    /// is still a complete frame once the body has ended.
    pub fn finish(&mut self) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        if !self.pending.is_empty() {
            self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        let mut deltas = self.drain_lines();
        if !self.finished && !self.buffer.is_empty() {
            let tail = std::mem::take(&mut self.buffer);
            if let Line::Delta(delta) = parse_line(tail.trim_end_matches('\r')) {
                deltas.push(delta);
            }
        }
        self.finished = true;
        deltas
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    self.buffer.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        // incomplete sequence at the end, wait for the next chunk
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            match parse_line(line.trim_end_matches(['\n', '\r'])) {
                Line::Delta(delta) => deltas.push(delta),
                Line::Done => {
                    self.finished = true;
                    self.buffer.clear();
                    self.pending.clear();
                    break;
                }
                Line::Skip => {}
            }
        }
        deltas
    }
}

fn parse_line(line: &str) -> Line {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Line::Skip;
    };
    if payload.trim() == DONE_SENTINEL {
        return Line::Done;
    }
    match parse_payload(payload) {
        Ok(Some(delta)) => Line::Delta(delta),
        Ok(None) => Line::Skip,
        Err(err) => {
            tracing::debug!(error = %err, "skipping stream frame");
            Line::Skip
        }
    }
}

/// Extracts `choices[0].delta.content`. `Ok(None)` for frames without text.
pub fn parse_payload(payload: &str) -> Result<Option<String>, ChatError> {
    let frame: StreamResponse =
        serde_json::from_str(payload).map_err(|e| ChatError::MalformedFrame(e.to_string()))?;
    Ok(frame
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

struct DecodeState<S> {
    source: Option<S>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
}

/// Turns a response body into a lazy, finite sequence of text deltas.
///
/// Ends at end of input or at `[DONE]`, whichever comes first. A read failure
/// is yielded once as an error and ends the sequence.
pub fn decode_stream<S>(body: S) -> impl Stream<Item = Result<String, ChatError>>
where
    S: Stream<Item = Result<Bytes, ChatError>> + Unpin,
{
    let state = DecodeState { source: Some(body), decoder: SseDecoder::new(), ready: VecDeque::new() };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.ready.pop_front() {
                return Some((Ok(delta), state));
            }
            let source = state.source.as_mut()?;
            match source.next().await {
                Some(Ok(chunk)) => {
                    state.ready.extend(state.decoder.push(&chunk));
                    if state.decoder.is_finished() {
                        state.source = None;
                    }
                }
                Some(Err(err)) => {
                    state.source = None;
                    return Some((Err(err), state));
                }
                None => {
                    state.ready.extend(state.decoder.finish());
                    state.source = None;
                }
            }
        }
    })
}
