// SPDX-License-Identifier: Apache-2.0

use crate::resolve::resolve_source;
use crate::{IngestError, IngestErrorCode};
use flate2::bufread::MultiGzDecoder;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Lazy, finite, non-restartable iterator over the elements of a top-level
/// JSON array. Decompression happens through a streaming transform, so peak
/// memory is one decompression buffer plus one in-flight record.
pub struct RecordStream {
    reader: Box<dyn BufRead>,
    source: String,
    state: StreamState,
    index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Start,
    InArray,
    Done,
}

/// Resolve `logical` (preferring a compressed variant) and open a record
/// stream over it.
pub fn open_record_stream(logical: &Path) -> Result<RecordStream, IngestError> {
    let resolved = resolve_source(logical);
    let file = File::open(&resolved).map_err(|e| {
        IngestError::new(
            IngestErrorCode::SourceNotFound,
            format!(
                "no dataset variant resolves for {}: {e}",
                logical.display()
            ),
        )
    })?;

    let extension = resolved
        .extension()
        .and_then(|x| x.to_str())
        .unwrap_or_default()
        .to_string();
    let reader: Box<dyn BufRead> = match extension.as_str() {
        "gz" => Box::new(BufReader::new(MultiGzDecoder::new(BufReader::new(file)))),
        "zst" => {
            let decoder = zstd::stream::read::Decoder::new(file).map_err(IngestError::io)?;
            Box::new(BufReader::new(decoder))
        }
        _ => Box::new(BufReader::new(file)),
    };

    Ok(RecordStream {
        reader,
        source: resolved.display().to_string(),
        state: StreamState::Start,
        index: 0,
    })
}

impl RecordStream {
    fn malformed(&self, detail: impl Into<String>) -> IngestError {
        IngestError::new(
            IngestErrorCode::MalformedStream,
            format!("{} (element {}): {}", self.source, self.index, detail.into()),
        )
    }

    fn peek_non_ws(&mut self) -> Result<Option<u8>, IngestError> {
        loop {
            let (skipped, found) = {
                let buf = self.reader.fill_buf().map_err(IngestError::io)?;
                if buf.is_empty() {
                    return Ok(None);
                }
                match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                    Some(pos) => (pos, Some(buf[pos])),
                    None => (buf.len(), None),
                }
            };
            self.reader.consume(skipped);
            if let Some(byte) = found {
                return Ok(Some(byte));
            }
        }
    }

    fn consume_byte(&mut self) {
        self.reader.consume(1);
    }

    fn read_element(&mut self) -> Result<serde_json::Value, IngestError> {
        let bytes = self.take_element_bytes()?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                self.index += 1;
                Ok(value)
            }
            Err(e) => Err(self.malformed(e.to_string())),
        }
    }

    /// Copy one element's bytes out of the reader, stopping at the first
    /// top-level `,` or `]`. The delimiter stays unconsumed for the framing
    /// state machine; brackets inside strings do not count toward nesting.
    fn take_element_bytes(&mut self) -> Result<Vec<u8>, IngestError> {
        let mut out = Vec::new();
        let mut depth: u32 = 0;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let (used, done) = {
                let buf = self.reader.fill_buf().map_err(IngestError::io)?;
                if buf.is_empty() {
                    return Err(self.malformed("unterminated element"));
                }
                let mut used = 0;
                let mut done = false;
                for &byte in buf {
                    if in_string {
                        if escaped {
                            escaped = false;
                        } else if byte == b'\\' {
                            escaped = true;
                        } else if byte == b'"' {
                            in_string = false;
                        }
                    } else {
                        match byte {
                            b'"' => in_string = true,
                            b'[' | b'{' => depth += 1,
                            b']' | b'}' if depth > 0 => depth -= 1,
                            b',' | b']' if depth == 0 => {
                                done = true;
                            }
                            _ => {}
                        }
                    }
                    if done {
                        break;
                    }
                    out.push(byte);
                    used += 1;
                }
                (used, done)
            };
            self.reader.consume(used);
            if done {
                return Ok(out);
            }
        }
    }
}

impl Iterator for RecordStream {
    type Item = Result<serde_json::Value, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            StreamState::Done => None,
            StreamState::Start => {
                match self.peek_non_ws() {
                    Ok(Some(b'[')) => self.consume_byte(),
                    Ok(Some(other)) => {
                        self.state = StreamState::Done;
                        return Some(Err(self.malformed(format!(
                            "expected top-level array, found byte {:#04x}",
                            other
                        ))));
                    }
                    Ok(None) => {
                        self.state = StreamState::Done;
                        return Some(Err(self.malformed("empty source")));
                    }
                    Err(e) => {
                        self.state = StreamState::Done;
                        return Some(Err(e));
                    }
                }
                match self.peek_non_ws() {
                    Ok(Some(b']')) => {
                        self.consume_byte();
                        self.state = StreamState::Done;
                        None
                    }
                    Ok(Some(_)) => {
                        self.state = StreamState::InArray;
                        Some(self.read_element())
                    }
                    Ok(None) => {
                        self.state = StreamState::Done;
                        Some(Err(self.malformed("unterminated array")))
                    }
                    Err(e) => {
                        self.state = StreamState::Done;
                        Some(Err(e))
                    }
                }
            }
            StreamState::InArray => match self.peek_non_ws() {
                Ok(Some(b',')) => {
                    self.consume_byte();
                    Some(self.read_element())
                }
                Ok(Some(b']')) => {
                    self.consume_byte();
                    self.state = StreamState::Done;
                    None
                }
                Ok(Some(other)) => {
                    self.state = StreamState::Done;
                    Some(Err(self.malformed(format!(
                        "expected ',' or ']' between elements, found byte {:#04x}",
                        other
                    ))))
                }
                Ok(None) => {
                    self.state = StreamState::Done;
                    Some(Err(self.malformed("unterminated array")))
                }
                Err(e) => {
                    self.state = StreamState::Done;
                    Some(Err(e))
                }
            },
        }
    }
}

/// Typed conversion of one structurally valid element. Failure here is the
/// skippable `MalformedRecord` condition, not a stream failure.
pub fn decode_record<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, IngestError> {
    serde_json::from_value(value)
        .map_err(|e| IngestError::new(IngestErrorCode::MalformedRecord, e.to_string()))
}
