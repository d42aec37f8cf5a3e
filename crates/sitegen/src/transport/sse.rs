//! Decoding of OpenAI-compatible chat completion streams.

use super::CompletionStream;
use crate::errors::TransportError;
use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Text(String),
    Done,
    Skip,
}

/// Turns the raw body of a streaming chat completion into text fragments.
///
/// Each `data:` line carries one JSON chunk whose `choices[0].delta.content`
/// is the next fragment; `data: [DONE]` ends the stream. Comment lines and
/// payloads that are not valid JSON are skipped.
pub fn decode_chat_stream<S>(body: S) -> CompletionStream
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    let lines = FramedRead::new(StreamReader::new(body), LinesCodec::new());
    Box::pin(decode_lines(lines))
}

fn decode_lines<L>(lines: L) -> impl Stream<Item = Result<String, TransportError>> + Send
where
    L: Stream<Item = Result<String, LinesCodecError>> + Send + 'static,
{
    try_stream! {
        futures::pin_mut!(lines);
        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| TransportError::Decode(e.to_string()))?;
            match decode_line(&line)? {
                SseLine::Text(text) => {
                    yield text;
                }
                SseLine::Done => break,
                SseLine::Skip => {}
            }
        }
    }
}

fn decode_line(line: &str) -> Result<SseLine, TransportError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data == DONE_MARKER {
        return Ok(SseLine::Done);
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, "skipping undecodable stream line");
            return Ok(SseLine::Skip);
        }
    };

    if let Some(error) = chunk.error {
        let status = error
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .filter(|code| (400..600).contains(code))
            .unwrap_or(502);
        return Err(TransportError::Http {
            status,
            message: error.message,
        });
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .map_or(SseLine::Skip, SseLine::Text))
}
