//! The interface to whatever delivers model output, and the mapping of its
//! failures onto user-visible outcomes.

pub mod sse;

use crate::errors::{TransportError, UpstreamFailure};
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;

/// Text fragments in arrival order. Fragment boundaries carry no meaning.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Provider message that signals the account ran out of included credits.
pub const QUOTA_EXCEEDED_MESSAGE: &str = "exceeded your monthly included credits";

/// Wraps already-received fragments, e.g. a recorded response, as a stream.
pub fn from_chunks<I>(chunks: I) -> CompletionStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)))
}

pub fn classify_http_error(status: u16, message: &str) -> UpstreamFailure {
    match status {
        401 | 403 => UpstreamFailure::AuthRequired,
        402 => UpstreamFailure::QuotaExceeded {
            message: message.to_string(),
        },
        _ if message.contains(QUOTA_EXCEEDED_MESSAGE) => UpstreamFailure::QuotaExceeded {
            message: message.to_string(),
        },
        _ => UpstreamFailure::Api {
            message: message.to_string(),
        },
    }
}

impl From<TransportError> for UpstreamFailure {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Network(message) => UpstreamFailure::Network { message },
            TransportError::Http { status, message } => classify_http_error(status, &message),
            TransportError::Decode(message) => UpstreamFailure::Api { message },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    #[serde(default = "default_ok")]
    ok: bool,
    #[serde(default)]
    open_login: bool,
    #[serde(default)]
    open_select_provider: bool,
    #[serde(default)]
    open_pro_modal: bool,
    #[serde(default)]
    message: Option<String>,
}

fn default_ok() -> bool {
    true
}

/// True when the trimmed text is shaped like a JSON object.
pub fn looks_like_envelope(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

/// Reads the `{"ok": false, ...}` object the generation endpoint sends
/// instead of model output when a request is refused.
///
/// Returns `None` for anything that is not a failed envelope, including text
/// that is merely shaped like JSON.
pub fn parse_error_envelope(text: &str) -> Option<UpstreamFailure> {
    if !looks_like_envelope(text) {
        return None;
    }
    let envelope: ErrorEnvelope = serde_json::from_str(text.trim()).ok()?;
    if envelope.ok {
        return None;
    }

    let message = envelope.message.unwrap_or_default();
    let failure = if envelope.open_login {
        UpstreamFailure::AuthRequired
    } else if envelope.open_select_provider {
        UpstreamFailure::ProviderRequired { message }
    } else if envelope.open_pro_modal {
        UpstreamFailure::QuotaExceeded { message }
    } else {
        UpstreamFailure::Api { message }
    };
    Some(failure)
}
