//! Streaming progress decoder
//!
//! Objects arrive back to back with no framing beyond JSON itself and may be
//! split across network chunks at any byte. [`ProgressDecoder`] buffers input and
//! yields complete events; [`decode_events`] adapts it to a byte stream.

use super::ProgressEvent;
use crate::error::{DecodeError, EngineError, PullError};
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Number;

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "progressDetail", default)]
    progress_detail: Option<RawProgressDetail>,
    #[serde(default)]
    error: Option<String>,
}

// Numbers keep their exact text until converted.
#[derive(Debug, Deserialize)]
struct RawProgressDetail {
    #[serde(default)]
    current: Option<Number>,
    #[serde(default)]
    total: Option<Number>,
}

impl RawEvent {
    fn into_event(self) -> Result<ProgressEvent, DecodeError> {
        let (current, total) = match self.progress_detail {
            Some(detail) => (
                to_f64("current", detail.current)?,
                to_f64("total", detail.total)?,
            ),
            None => (None, None),
        };

        Ok(ProgressEvent {
            status: self.status.unwrap_or_default(),
            id: self.id,
            current,
            total,
            error: self.error,
        })
    }
}

fn to_f64(field: &'static str, number: Option<Number>) -> Result<Option<f64>, DecodeError> {
    match number {
        None => Ok(None),
        Some(n) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| DecodeError::NumberOutOfRange {
                field,
                value: n.to_string(),
            }),
    }
}

/// Largest single event the decoder buffers before giving up
pub const MAX_EVENT_BYTES: usize = 1 << 20;

/// Incremental decoder over concatenated JSON objects
#[derive(Debug)]
pub struct ProgressDecoder {
    buffer: Vec<u8>,
    // Length of `buffer` at the last incomplete parse of an object
    checked: usize,
    limit: usize,
}

impl Default for ProgressDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_BYTES)
    }
}

impl ProgressDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder failing once a pending event grows past `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            checked: 0,
            limit,
        }
    }

    /// Append bytes read from the stream
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete event, or `None` when more input is needed
    pub fn next_event(&mut self) -> Result<Option<ProgressEvent>, DecodeError> {
        // A pending object cannot complete before another closing brace arrives.
        if self.checked > 0
            && self.pending_object()
            && !self.buffer[self.checked..].contains(&b'}')
        {
            return self.incomplete();
        }

        let mut values = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<RawEvent>();

        match values.next() {
            None => {
                // only whitespace left
                self.buffer.clear();
                self.checked = 0;
                Ok(None)
            }
            Some(Ok(raw)) => {
                let consumed = values.byte_offset();
                self.buffer.drain(..consumed);
                self.checked = 0;
                raw.into_event().map(Some)
            }
            Some(Err(e)) if e.is_eof() => self.incomplete(),
            Some(Err(e)) => Err(DecodeError::Malformed(e)),
        }
    }

    fn pending_object(&self) -> bool {
        self.buffer
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{')
    }

    fn incomplete(&mut self) -> Result<Option<ProgressEvent>, DecodeError> {
        if self.buffer.len() > self.limit {
            return Err(DecodeError::EventTooLarge(self.limit));
        }
        self.checked = self.buffer.len();
        Ok(None)
    }

    /// Check that nothing but whitespace is left once the stream has ended
    pub fn finish(&self) -> Result<(), DecodeError> {
        let trailing = self
            .buffer
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .count();
        if trailing == 0 {
            Ok(())
        } else {
            Err(DecodeError::Truncated(self.buffer.len()))
        }
    }
}

struct DecodeState<S> {
    body: S,
    decoder: ProgressDecoder,
    done: bool,
}

/// Lazily decode a pull response body.
///
/// The stream ends after the first error; events yielded before it stay valid.
pub fn decode_events<S>(body: S) -> impl Stream<Item = Result<ProgressEvent, PullError>>
where
    S: Stream<Item = Result<Bytes, EngineError>> + Unpin,
{
    let state = DecodeState {
        body,
        decoder: ProgressDecoder::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        loop {
            match state.decoder.next_event() {
                Ok(Some(event)) => return Some((Ok(event), state)),
                Ok(None) => {}
                Err(e) => {
                    state.done = true;
                    return Some((Err(PullError::Decode(e)), state));
                }
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.decoder.push(&chunk),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(PullError::Stream(e)), state));
                }
                None => {
                    state.done = true;
                    return match state.decoder.finish() {
                        Ok(()) => None,
                        Err(e) => Some((Err(PullError::Decode(e)), state)),
                    };
                }
            }
        }
    })
}
