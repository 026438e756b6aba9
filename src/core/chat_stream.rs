use std::future::Future;

use futures_util::StreamExt;
use memchr::memchr;
use reqwest::StatusCode;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponseChunk};
use crate::utils::url::construct_api_url;

/// Failures raised by the streaming transport and the tags endpoint.
///
/// `Aborted` is not an error from the user's point of view: it is how a
/// cancelled call unwinds, and the generation controller swallows it.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Invalid chat request: {0}")]
    InvalidRequest(&'static str),

    #[error("{source}")]
    Connect {
        #[source]
        source: reqwest::Error,
    },

    #[error("Model '{model}' not found. Run `ollama pull {model}` to install it.")]
    ModelNotFound { model: String },

    #[error("Ollama returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Ollama reported an error: {0}")]
    Remote(String),

    #[error("No response body")]
    NoBody,

    #[error("Malformed stream record `{line}`: {source}")]
    Malformed {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("{0}")]
    Http(#[source] reqwest::Error),

    #[error("Failed to fetch models (status {status}): {body}")]
    ListModels { status: u16, body: String },

    #[error("Request aborted")]
    Aborted,

    #[error("An unexpected error occurred.")]
    Unexpected,
}

impl StreamError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            StreamError::Connect { source: err }
        } else if err.is_timeout() {
            StreamError::Timeout(err)
        } else if err.is_request() || err.is_body() || err.is_builder() || err.is_decode() {
            StreamError::Http(err)
        } else {
            warn!(error = %err, "unclassified HTTP failure");
            StreamError::Unexpected
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, StreamError::Aborted)
    }
}

/// Map a non-success response to the error the user should see.
fn status_error(model: &str, status: StatusCode, body: String) -> StreamError {
    if status == StatusCode::NOT_FOUND || body.contains("not found") {
        StreamError::ModelNotFound {
            model: model.to_string(),
        }
    } else {
        StreamError::Server {
            status: status.as_u16(),
            body,
        }
    }
}

fn parse_record(line: &[u8]) -> Option<Result<ChatResponseChunk, StreamError>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let parsed = serde_json::from_slice::<RawChunk>(line).map_err(|source| {
        StreamError::Malformed {
            line: String::from_utf8_lossy(line).into_owned(),
            source,
        }
    });

    Some(parsed.and_then(|raw| match raw.error {
        Some(message) => Err(StreamError::Remote(message)),
        None => Ok(raw.chunk),
    }))
}

#[derive(serde::Deserialize)]
struct RawChunk {
    #[serde(flatten)]
    chunk: ChatResponseChunk,
    #[serde(default)]
    error: Option<String>,
}

/// Incremental NDJSON splitter.
///
/// Bytes are buffered as received so multi-byte characters split across
/// network reads decode correctly once their line is complete.
#[derive(Debug, Default)]
pub struct NdjsonBuffer {
    buffer: Vec<u8>,
}

impl NdjsonBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete record, skipping blank lines.
    pub fn next_record(&mut self) -> Option<Result<ChatResponseChunk, StreamError>> {
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let record = parse_record(&self.buffer[..newline_pos]);
            self.buffer.drain(..=newline_pos);
            if record.is_some() {
                return record;
            }
        }
        None
    }

    /// Parse whatever remains after end-of-data. Whitespace-only remainders
    /// yield nothing.
    pub fn finish(&mut self) -> Option<Result<ChatResponseChunk, StreamError>> {
        let remainder = std::mem::take(&mut self.buffer);
        parse_record(&remainder)
    }

    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

async fn or_cancelled<T>(
    cancel_token: &CancellationToken,
    future: impl Future<Output = T>,
) -> Result<T, StreamError> {
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => Err(StreamError::Aborted),
        value = future => Ok(value),
    }
}

/// Run one streaming exchange against `{base_url}/api/chat`.
///
/// `on_chunk` fires once per record, in arrival order. Once `cancel_token` is
/// cancelled the in-flight request is dropped, `on_chunk` is not called
/// again, and the call returns [`StreamError::Aborted`].
pub async fn chat_stream<F>(
    client: &reqwest::Client,
    base_url: &str,
    request: &ChatRequest,
    mut on_chunk: F,
    cancel_token: &CancellationToken,
) -> Result<(), StreamError>
where
    F: FnMut(&ChatResponseChunk),
{
    if request.model.trim().is_empty() {
        return Err(StreamError::InvalidRequest("a model name is required"));
    }
    if request.messages.is_empty() {
        return Err(StreamError::InvalidRequest("at least one message is required"));
    }

    let chat_url = construct_api_url(base_url, "api/chat");
    debug!(url = %chat_url, model = %request.model, messages = request.messages.len(), "starting chat stream");

    let body = WireRequest {
        model: &request.model,
        messages: &request.messages,
        stream: true,
    };
    let http_request = client
        .post(chat_url)
        .header("Content-Type", "application/json")
        .json(&body);

    let response = or_cancelled(cancel_token, http_request.send())
        .await?
        .map_err(StreamError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        let error_text = or_cancelled(cancel_token, response.text())
            .await?
            .unwrap_or_default();
        debug!(status = status.as_u16(), "chat request rejected");
        return Err(status_error(&request.model, status, error_text));
    }
    if matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) {
        return Err(StreamError::NoBody);
    }

    let mut stream = response.bytes_stream();
    let mut buffer = NdjsonBuffer::new();
    let mut dispatched = 0usize;

    while let Some(chunk) = or_cancelled(cancel_token, stream.next()).await? {
        let chunk_bytes = chunk.map_err(StreamError::from_reqwest)?;
        buffer.extend(&chunk_bytes);

        while let Some(record) = buffer.next_record() {
            if cancel_token.is_cancelled() {
                return Err(StreamError::Aborted);
            }
            on_chunk(&record?);
            dispatched += 1;
        }
    }

    if let Some(record) = buffer.finish() {
        if cancel_token.is_cancelled() {
            return Err(StreamError::Aborted);
        }
        on_chunk(&record?);
        dispatched += 1;
    }

    debug!(records = dispatched, "chat stream finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = concat!(
        r#"{"model":"glm-ocr","message":{"role":"assistant","content":"Hel"},"done":false}"#,
        "\n",
        r#"{"model":"glm-ocr","message":{"role":"assistant","content":"lo, "},"done":false}"#,
        "\n",
        r#"{"model":"glm-ocr","message":{"role":"assistant","content":"wörld"},"done":false}"#,
        "\n",
        r#"{"model":"glm-ocr","message":{"role":"assistant","content":""},"done":true}"#,
        "\n",
    );

    fn drain(buffer: &mut NdjsonBuffer, out: &mut Vec<ChatResponseChunk>) {
        while let Some(record) = buffer.next_record() {
            out.push(record.expect("well-formed record"));
        }
    }

    fn feed_in_pieces(bytes: &[u8], cuts: &[usize]) -> Vec<ChatResponseChunk> {
        let mut buffer = NdjsonBuffer::new();
        let mut out = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            buffer.extend(&bytes[start..cut]);
            drain(&mut buffer, &mut out);
            start = cut;
        }
        buffer.extend(&bytes[start..]);
        drain(&mut buffer, &mut out);
        if let Some(record) = buffer.finish() {
            out.push(record.expect("well-formed remainder"));
        }
        out
    }

    #[test]
    fn split_reads_dispatch_the_same_records() {
        let bytes = REPLY.as_bytes();
        let whole = feed_in_pieces(bytes, &[]);
        assert_eq!(whole.len(), 4);

        // Every single cut point, including inside the multi-byte 'ö'.
        for cut in 1..bytes.len() {
            assert_eq!(feed_in_pieces(bytes, &[cut]), whole, "cut at {cut}");
        }

        let byte_by_byte: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(feed_in_pieces(bytes, &byte_by_byte), whole);
    }

    #[test]
    fn concatenated_content_reconstructs_reply() {
        let bytes = REPLY.as_bytes();
        for cuts in [vec![], vec![3, 90, 91], vec![40, 120, 200, 260]] {
            let text: String = feed_in_pieces(bytes, &cuts)
                .iter()
                .filter_map(|chunk| chunk.content())
                .collect();
            assert_eq!(text, "Hello, wörld");
        }
    }

    #[test]
    fn trailing_record_without_newline_is_parsed_at_end() {
        let mut buffer = NdjsonBuffer::new();
        buffer.extend(br#"{"message":{"content":"tail"},"done":true}"#);
        assert!(buffer.next_record().is_none());
        let record = buffer.finish().expect("remainder").expect("parse");
        assert_eq!(record.content(), Some("tail"));
        assert!(record.done);
    }

    #[test]
    fn whitespace_remainder_and_blank_lines_are_ignored() {
        let mut buffer = NdjsonBuffer::new();
        buffer.extend(b"\r\n\n{\"done\":true}\r\n  \t");
        let record = buffer.next_record().expect("record").expect("parse");
        assert!(record.done);
        assert!(buffer.next_record().is_none());
        assert!(buffer.finish().is_none());
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn malformed_line_is_an_error_not_skipped() {
        let mut buffer = NdjsonBuffer::new();
        buffer.extend(b"{\"done\":false}\nnot json\n{\"done\":true}\n");
        assert!(buffer.next_record().expect("first").is_ok());
        match buffer.next_record() {
            Some(Err(StreamError::Malformed { line, .. })) => assert_eq!(line, "not json"),
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn in_stream_error_record_is_surfaced() {
        let mut buffer = NdjsonBuffer::new();
        buffer.extend(b"{\"error\":\"out of memory\"}\n");
        match buffer.next_record() {
            Some(Err(StreamError::Remote(message))) => assert_eq!(message, "out of memory"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn status_error_names_missing_model() {
        let err = status_error("glm-ocr", StatusCode::NOT_FOUND, String::new());
        let text = err.to_string();
        assert!(text.contains("'glm-ocr'"), "{text}");
        assert!(text.contains("ollama pull glm-ocr"), "{text}");

        let err = status_error(
            "llava",
            StatusCode::BAD_REQUEST,
            r#"{"error":"model \"llava\" not found, try pulling it first"}"#.to_string(),
        );
        assert!(matches!(err, StreamError::ModelNotFound { ref model } if model == "llava"));
    }

    #[test]
    fn status_error_includes_status_and_body() {
        let err = status_error("llama3.2", StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert_eq!(err.to_string(), "Ollama returned 500: boom");
    }
}
