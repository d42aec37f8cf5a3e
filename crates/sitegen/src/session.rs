//! Drives reconciliation while a completion streams in.
//!
//! A [`GenerationSession`] owns the accumulated text of one response and the
//! collection the generation started from. Every chunk triggers a fresh
//! reconciliation of the whole buffer; the newest result replaces the previous
//! one, so nothing is ever applied twice.
//!
//! Chunks are consumed strictly in order by a single task. Independent
//! sessions share no state.

use crate::config::{EngineConfig, ReasoningMarkers};
use crate::errors::{GenerationError, TransportError, UpstreamFailure};
use crate::models::supports_reasoning;
use crate::pages::PageCollection;
use crate::patch::LineRange;
use crate::reconcile::{GenerationMode, ReconcileStats, Reconciler, Reconciliation};
use crate::transport::{looks_like_envelope, parse_error_envelope};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Reasoning text received so far, without the opening marker.
    Thinking(String),
    /// The reasoning segment closed. Sent once per session.
    FinishedThinking,
    /// A pass produced a different page state.
    Updated(Reconciliation),
}

/// Final state of a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub pages: PageCollection,
    pub active_page: Option<String>,
    pub updated_lines: Vec<LineRange>,
    pub stats: ReconcileStats,
    /// Stopped on request; the fields hold the last committed pass.
    pub cancelled: bool,
}

impl GenerationOutcome {
    fn from_reconciliation(reconciliation: Reconciliation, cancelled: bool) -> Self {
        Self {
            pages: reconciliation.pages,
            active_page: reconciliation.active_page,
            updated_lines: reconciliation.updated_lines,
            stats: reconciliation.stats,
            cancelled,
        }
    }
}

enum Reasoning<'a> {
    /// The buffer does not start a reasoning segment.
    Absent,
    /// Inside the segment; holds the reasoning text so far.
    Open(&'a str),
    /// The segment closed; holds everything outside it.
    Closed(String),
}

fn split_reasoning<'a>(buffer: &'a str, markers: &ReasoningMarkers) -> Reasoning<'a> {
    let Some(open_at) = buffer.find(&markers.open) else {
        return Reasoning::Absent;
    };
    let thought_start = open_at + markers.open.len();
    // SAFETY: offsets come from `str::find` matches on marker boundaries.
    #[allow(clippy::string_slice)]
    let rest = &buffer[thought_start..];
    match rest.find(&markers.close) {
        None => Reasoning::Open(rest),
        Some(close_at) => {
            let after = thought_start + close_at + markers.close.len();
            #[allow(clippy::string_slice)]
            let content = format!("{}{}", &buffer[..open_at], &buffer[after..]);
            Reasoning::Closed(content)
        }
    }
}

pub struct GenerationSession {
    id: Uuid,
    span: tracing::Span,
    reconciler: Reconciler,
    base: PageCollection,
    buffer: String,
    reasoning: Option<ReasoningMarkers>,
    finished_thinking: bool,
    emit_unchanged: bool,
    cancellation: CancellationToken,
    current: Reconciliation,
}

impl GenerationSession {
    pub fn new(mode: GenerationMode, base: PageCollection, config: &EngineConfig) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("generation", session_id = %id, mode = %mode);
        let reconciler = Reconciler::new(mode).with_home_paths(config.home_paths.clone());
        let current = reconciler.reconcile(&base, "");
        Self {
            id,
            span,
            reconciler,
            base,
            buffer: String::new(),
            reasoning: None,
            finished_thinking: false,
            emit_unchanged: config.emit_unchanged,
            cancellation: CancellationToken::new(),
            current,
        }
    }

    /// Enables reasoning detection if the catalog marks `model` as a thinker.
    pub fn with_model(self, model: &str, config: &EngineConfig) -> Self {
        let markers = supports_reasoning(model).then(|| config.reasoning.clone());
        self.with_reasoning(markers)
    }

    pub fn with_reasoning(mut self, markers: Option<ReasoningMarkers>) -> Self {
        self.reasoning = markers;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> GenerationMode {
        self.reconciler.mode()
    }

    /// Token that stops the session. Cancelling keeps the last committed pass.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Result of the last committed pass.
    pub fn current(&self) -> &Reconciliation {
        &self.current
    }

    /// Appends `chunk` and re-runs reconciliation over the whole buffer.
    ///
    /// Does nothing once the session is cancelled.
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<SessionEvent> {
        if self.cancellation.is_cancelled() {
            return Vec::new();
        }
        let span = self.span.clone();
        let _enter = span.enter();

        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        let reasoning = match &self.reasoning {
            Some(markers) => split_reasoning(&self.buffer, markers),
            None => Reasoning::Absent,
        };
        let content = match reasoning {
            Reasoning::Absent => Cow::Borrowed(self.buffer.as_str()),
            Reasoning::Open(thought) => {
                events.push(SessionEvent::Thinking(thought.trim().to_string()));
                return events;
            }
            Reasoning::Closed(content) => {
                if !self.finished_thinking {
                    self.finished_thinking = true;
                    tracing::debug!("reasoning segment closed");
                    events.push(SessionEvent::FinishedThinking);
                }
                Cow::Owned(content)
            }
        };

        let next = self.reconciler.reconcile(&self.base, &content);
        if self.cancellation.is_cancelled() {
            return events;
        }

        let changed = next.pages != self.current.pages
            || next.active_page != self.current.active_page
            || next.updated_lines != self.current.updated_lines;
        self.current = next;
        if changed || self.emit_unchanged {
            events.push(SessionEvent::Updated(self.current.clone()));
        }
        events
    }

    /// Runs the final pass once the stream has ended.
    ///
    /// A response that is a JSON error envelope becomes the matching
    /// [`UpstreamFailure`]. A stream that never produced a page is malformed.
    pub fn finish(self) -> Result<GenerationOutcome, GenerationError> {
        let span = self.span.clone();
        let _enter = span.enter();

        if let Some(failure) = parse_error_envelope(&self.buffer) {
            tracing::warn!(error = %failure, "generation refused upstream");
            return Err(failure.into());
        }
        if looks_like_envelope(&self.buffer) {
            tracing::warn!("response looks like JSON but is not an error envelope");
        }

        let content = self
            .structural_content()
            .map(Cow::into_owned)
            .unwrap_or_default();
        let last = self.reconciler.reconcile(&self.base, &content);

        match self.mode() {
            GenerationMode::FullRegeneration | GenerationMode::NewPage
                if last.stats.pages_extracted == 0 =>
            {
                return Err(GenerationError::Malformed(
                    "no page could be extracted from the response".to_string(),
                ));
            }
            GenerationMode::IncrementalPatch if content.trim().is_empty() => {
                return Err(GenerationError::Malformed("empty response".to_string()));
            }
            _ => {}
        }

        tracing::info!(
            pages = last.pages.len(),
            directives_applied = last.stats.directives_applied,
            directives_missing = last.stats.directives_missing,
            "generation finished"
        );
        Ok(GenerationOutcome::from_reconciliation(last, false))
    }

    /// Feeds `stream` through the session until it ends, fails or the
    /// session is cancelled, forwarding events to `events`.
    pub async fn run<S>(
        mut self,
        mut stream: S,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<GenerationOutcome, GenerationError>
    where
        S: Stream<Item = Result<String, TransportError>> + Unpin,
    {
        let span = self.span.clone();
        async move {
            tracing::info!(base_pages = self.base.len(), "generation started");
            let cancellation = self.cancellation.clone();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => None,
                    next = stream.next() => Some(next),
                };
                let Some(next) = next else {
                    return Ok(self.into_cancelled());
                };

                match next {
                    Some(Ok(chunk)) => {
                        for event in self.push_chunk(&chunk) {
                            let sent = tokio::select! {
                                biased;
                                _ = cancellation.cancelled() => return Ok(self.into_cancelled()),
                                sent = events.send(event) => sent,
                            };
                            if sent.is_err() {
                                tracing::debug!("event receiver dropped");
                            }
                        }
                    }
                    Some(Err(error)) => {
                        let failure = UpstreamFailure::from(error);
                        tracing::warn!(error = %failure, "completion stream failed");
                        return Err(failure.into());
                    }
                    None => break,
                }

                if cancellation.is_cancelled() {
                    return Ok(self.into_cancelled());
                }
            }

            self.finish()
        }
        .instrument(span)
        .await
    }

    fn into_cancelled(self) -> GenerationOutcome {
        tracing::info!(buffered = self.buffer.len(), "generation cancelled");
        GenerationOutcome::from_reconciliation(self.current, true)
    }

    /// The buffer with any reasoning segment removed. `None` while the
    /// segment is still open.
    fn structural_content(&self) -> Option<Cow<'_, str>> {
        let Some(markers) = &self.reasoning else {
            return Some(Cow::Borrowed(&self.buffer));
        };
        match split_reasoning(&self.buffer, markers) {
            Reasoning::Absent => Some(Cow::Borrowed(&self.buffer)),
            Reasoning::Open(_) => None,
            Reasoning::Closed(content) => Some(Cow::Owned(content)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::Page;

    const PAGE: &str = "<<<<<<< START_TITLE index.html >>>>>>> END_TITLE\n\
        ```html\n<!DOCTYPE html><html><body>hi</body></html>\n```";

    fn thinker_session() -> GenerationSession {
        let config = EngineConfig::default();
        GenerationSession::new(GenerationMode::FullRegeneration, PageCollection::new(), &config)
            .with_model("deepseek/deepseek-r1", &config)
    }

    #[test]
    fn reasoning_is_routed_until_closed() {
        let mut session = thinker_session();

        assert_eq!(
            session.push_chunk("<think>Plan: a hero"),
            vec![SessionEvent::Thinking("Plan: a hero".into())]
        );
        assert_eq!(
            session.push_chunk(" section "),
            vec![SessionEvent::Thinking("Plan: a hero section".into())]
        );

        let events = session.push_chunk("</think>\n");
        assert_eq!(events, vec![SessionEvent::FinishedThinking]);

        let events = session.push_chunk(PAGE);
        assert!(matches!(events.as_slice(), [SessionEvent::Updated(r)] if r.pages.len() == 1));
        assert!(!events.contains(&SessionEvent::FinishedThinking));
    }

    #[test]
    fn reasoning_text_never_reaches_pages() {
        let mut session = thinker_session();
        session.push_chunk("<think>maybe <<<<<<< START_TITLE bad.html >>>>>>> END_TITLE</think>");
        session.push_chunk(PAGE);
        let outcome = session.finish().unwrap();
        let paths: Vec<_> = outcome.pages.paths().collect();
        assert_eq!(paths, vec!["index.html"]);
    }

    #[test]
    fn non_thinker_parses_markers_as_content() {
        let config = EngineConfig::default();
        let mut session =
            GenerationSession::new(GenerationMode::FullRegeneration, PageCollection::new(), &config)
                .with_model("openai/gpt-4o", &config);
        let events = session.push_chunk("<think>");
        assert!(events.is_empty());
    }

    #[test]
    fn unchanged_passes_are_not_reported() {
        let mut session = thinker_session();
        assert_eq!(session.push_chunk(PAGE).len(), 1);
        assert!(session.push_chunk("\n").is_empty());
        assert!(session.push_chunk(" \n").is_empty());
    }

    #[test]
    fn emit_unchanged_reports_every_pass() {
        let config = EngineConfig {
            emit_unchanged: true,
            ..EngineConfig::default()
        };
        let mut session =
            GenerationSession::new(GenerationMode::FullRegeneration, PageCollection::new(), &config);
        assert_eq!(session.push_chunk("Working on it").len(), 1);
        assert_eq!(session.push_chunk("...").len(), 1);
    }

    #[test]
    fn cancelled_session_ignores_chunks() {
        let base = PageCollection::from_pages(vec![Page::new("index.html", "<p>old</p>")]);
        let mut session =
            GenerationSession::new(GenerationMode::FullRegeneration, base.clone(), &EngineConfig::default());
        session.cancellation_token().cancel();
        assert!(session.push_chunk(PAGE).is_empty());
        assert!(session.buffer().is_empty());
        assert_eq!(session.current().pages, base);
    }

    #[tokio::test]
    async fn cancel_interrupts_a_blocked_event_send() {
        let chunks = vec![
            Ok::<_, TransportError>(PAGE.to_string()),
            Ok("<<<<<<< START_TITLE about.html >>>>>>> END_TITLE\n<!DOCTYPE html><html>".to_string()),
            Ok("<body>about</body></html>".to_string()),
        ];
        let stream = Box::pin(
            futures::stream::iter(chunks).chain(futures::stream::pending::<Result<String, TransportError>>()),
        );
        let session = GenerationSession::new(
            GenerationMode::FullRegeneration,
            PageCollection::new(),
            &EngineConfig::default(),
        );
        let token = session.cancellation_token();
        // Kept alive but never read, so the second send blocks.
        let (tx, _rx) = mpsc::channel(1);

        let run = tokio::spawn(session.run(stream, tx));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(2), run)
            .await
            .expect("run did not stop after cancel")
            .unwrap()
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.pages.contains("index.html"));
    }

    #[test]
    fn new_page_without_page_is_malformed() {
        let session = GenerationSession::new(
            GenerationMode::NewPage,
            PageCollection::new(),
            &EngineConfig::default(),
        );
        assert!(matches!(session.finish(), Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn empty_patch_response_is_malformed() {
        let mut session = GenerationSession::new(
            GenerationMode::IncrementalPatch,
            PageCollection::new(),
            &EngineConfig::default(),
        );
        session.push_chunk("  \n");
        assert!(matches!(session.finish(), Err(GenerationError::Malformed(_))));
    }
}
