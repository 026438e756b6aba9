//! Stateful wrapper around [`chat_stream`] that owns cancellation and
//! exposes the accumulated reply as observable state.
//!
//! Each call to [`GenerationController::generate`] gets a fresh
//! [`CancellationToken`] and a new stream id. Transport callbacks only commit
//! to [`GenerationState`] while their id is still the current one, so a
//! superseded or aborted call can never write into its successor's result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ChatMessage, ChatRequest};
use crate::core::chat_stream::{chat_stream, StreamError};
use crate::core::config::Config;
use crate::core::constants::UNEXPECTED_ERROR_MESSAGE;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationState {
    pub result: String,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Where the Ollama base URL comes from.
#[derive(Debug, Clone)]
pub enum EndpointSource {
    /// Always use this URL.
    Fixed(String),
    /// Re-read the user's settings on every call.
    Settings,
}

impl EndpointSource {
    pub fn resolve(&self) -> String {
        match self {
            EndpointSource::Fixed(url) => url.clone(),
            EndpointSource::Settings => Config::resolve_ollama_url(),
        }
    }
}

/// Rewrite a transport failure into the message shown to the user.
pub fn classify_error(err: &StreamError, base_url: &str) -> String {
    match err {
        StreamError::Connect { .. } => format!(
            "Cannot connect to Ollama. Make sure it's running on {}.",
            display_address(base_url)
        ),
        StreamError::Unexpected => UNEXPECTED_ERROR_MESSAGE.to_string(),
        other => other.to_string(),
    }
}

fn display_address(base_url: &str) -> &str {
    let without_scheme = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .unwrap_or(base_url);
    without_scheme.trim_end_matches('/')
}

#[derive(Default)]
struct StreamControl {
    current_stream_id: u64,
    stream_cancel_token: Option<CancellationToken>,
}

impl StreamControl {
    fn is_current(&self, stream_id: u64) -> bool {
        self.current_stream_id == stream_id && self.stream_cancel_token.is_some()
    }
}

struct Shared {
    client: reqwest::Client,
    model: String,
    endpoint: EndpointSource,
    control: Mutex<StreamControl>,
    state: watch::Sender<GenerationState>,
}

/// Cheap to clone; clones drive the same generation.
#[derive(Clone)]
pub struct GenerationController {
    shared: Arc<Shared>,
}

impl GenerationController {
    pub fn new(client: reqwest::Client, model: impl Into<String>, endpoint: EndpointSource) -> Self {
        let (state, _) = watch::channel(GenerationState::default());
        Self {
            shared: Arc::new(Shared {
                client,
                model: model.into(),
                endpoint,
                control: Mutex::new(StreamControl::default()),
                state,
            }),
        }
    }

    pub fn model(&self) -> &str {
        &self.shared.model
    }

    pub fn state(&self) -> GenerationState {
        self.shared.state.borrow().clone()
    }

    /// Receive every state change, starting from the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.shared.state.subscribe()
    }

    /// Stream a reply for `messages` into the state, superseding any call
    /// still in flight. Returns once this call has finished, failed, or been
    /// cancelled.
    pub async fn generate(&self, messages: Vec<ChatMessage>) {
        let (cancel_token, stream_id) = self.start_new_stream();
        let _release = StreamRelease {
            controller: self,
            stream_id,
        };
        let base_url = self.shared.endpoint.resolve();
        let request = ChatRequest::streaming(self.shared.model.clone(), messages);

        let outcome = chat_stream(
            &self.shared.client,
            &base_url,
            &request,
            |chunk| {
                if let Some(content) = chunk.content() {
                    self.commit(stream_id, |state| state.result.push_str(content));
                }
            },
            &cancel_token,
        )
        .await;

        self.finish_stream(stream_id, outcome, &base_url);
    }

    /// Cancel the in-flight call, keeping whatever it produced so far.
    pub fn abort(&self) {
        let mut control = self.control();
        if let Some(token) = control.stream_cancel_token.take() {
            debug!(stream_id = control.current_stream_id, "aborting generation");
            token.cancel();
        }
        self.shared.state.send_modify(|state| state.is_loading = false);
    }

    /// Cancel the in-flight call and clear the result and error.
    pub fn reset(&self) {
        let mut control = self.control();
        if let Some(token) = control.stream_cancel_token.take() {
            token.cancel();
        }
        self.shared.state.send_modify(|state| {
            state.result.clear();
            state.error = None;
            state.is_loading = false;
        });
    }

    fn control(&self) -> MutexGuard<'_, StreamControl> {
        self.shared
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn start_new_stream(&self) -> (CancellationToken, u64) {
        let mut control = self.control();
        if let Some(previous) = control.stream_cancel_token.take() {
            debug!(stream_id = control.current_stream_id, "superseding generation");
            previous.cancel();
        }

        control.current_stream_id += 1;
        let token = CancellationToken::new();
        control.stream_cancel_token = Some(token.clone());

        self.shared.state.send_modify(|state| {
            state.result.clear();
            state.error = None;
            state.is_loading = true;
        });

        (token, control.current_stream_id)
    }

    fn commit(&self, stream_id: u64, mutate: impl FnOnce(&mut GenerationState)) -> bool {
        let control = self.control();
        if !control.is_current(stream_id) {
            return false;
        }
        self.shared.state.send_modify(mutate);
        true
    }

    /// Give up `stream_id` without recording an outcome.
    fn release_stream(&self, stream_id: u64) {
        let mut control = self.control();
        if !control.is_current(stream_id) {
            return;
        }
        if let Some(token) = control.stream_cancel_token.take() {
            debug!(stream_id, "generation dropped before completion");
            token.cancel();
        }
        self.shared.state.send_modify(|state| state.is_loading = false);
    }

    fn finish_stream(&self, stream_id: u64, outcome: Result<(), StreamError>, base_url: &str) {
        let mut control = self.control();
        if !control.is_current(stream_id) {
            // Aborted or superseded; whoever cancelled us owns the state now.
            return;
        }
        control.stream_cancel_token = None;

        let error = match outcome {
            Ok(()) => None,
            Err(err) if err.is_aborted() => None,
            Err(err) => {
                debug!(stream_id, error = %err, "generation failed");
                Some(classify_error(&err, base_url))
            }
        };

        self.shared.state.send_modify(|state| {
            state.is_loading = false;
            if error.is_some() {
                state.error = error;
            }
        });
    }
}

/// Releases the stream if the `generate` future is dropped mid-flight.
/// After `finish_stream` the id is no longer current and this does nothing.
struct StreamRelease<'a> {
    controller: &'a GenerationController,
    stream_id: u64,
}

impl Drop for StreamRelease<'_> {
    fn drop(&mut self) {
        self.controller.release_stream(self.stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> GenerationController {
        GenerationController::new(
            reqwest::Client::new(),
            "llama3.2",
            EndpointSource::Fixed("http://127.0.0.1:9".into()),
        )
    }

    #[test]
    fn abort_and_reset_are_safe_when_idle() {
        let controller = controller();
        controller.abort();
        assert_eq!(controller.state(), GenerationState::default());
        controller.reset();
        assert_eq!(controller.state(), GenerationState::default());
    }

    #[test]
    fn stale_stream_cannot_commit() {
        let controller = controller();
        let (_, first) = controller.start_new_stream();
        let (_, second) = controller.start_new_stream();

        assert!(!controller.commit(first, |state| state.result.push_str("old")));
        assert!(controller.commit(second, |state| state.result.push_str("new")));
        assert_eq!(controller.state().result, "new");

        controller.finish_stream(first, Err(StreamError::NoBody), "http://localhost:11434");
        let state = controller.state();
        assert!(state.is_loading);
        assert_eq!(state.error, None);
    }

    #[test]
    fn abort_keeps_partial_result_and_reset_clears_it() {
        let controller = controller();
        let (token, id) = controller.start_new_stream();
        controller.commit(id, |state| state.result.push_str("partial"));

        controller.abort();
        assert!(token.is_cancelled());
        let state = controller.state();
        assert!(!state.is_loading);
        assert_eq!(state.result, "partial");

        controller.finish_stream(id, Err(StreamError::Aborted), "http://localhost:11434");
        assert_eq!(controller.state().error, None);

        controller.reset();
        assert_eq!(controller.state(), GenerationState::default());
    }

    #[test]
    fn release_only_applies_to_the_current_stream() {
        let controller = controller();
        let (first_token, first) = controller.start_new_stream();
        let (second_token, second) = controller.start_new_stream();

        controller.release_stream(first);
        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
        assert!(controller.state().is_loading);

        controller.release_stream(second);
        assert!(second_token.is_cancelled());
        assert!(!controller.state().is_loading);
    }

    #[test]
    fn classify_error_rewrites_only_connect_and_unexpected() {
        assert_eq!(
            classify_error(&StreamError::Unexpected, "http://localhost:11434"),
            UNEXPECTED_ERROR_MESSAGE
        );
        assert_eq!(
            classify_error(
                &StreamError::Server {
                    status: 500,
                    body: "boom".into()
                },
                "http://localhost:11434"
            ),
            "Ollama returned 500: boom"
        );
    }

    #[test]
    fn display_address_strips_scheme_and_slashes() {
        assert_eq!(display_address("http://localhost:11434/"), "localhost:11434");
        assert_eq!(display_address("https://gpu-box:11434"), "gpu-box:11434");
        assert_eq!(display_address("gpu-box:11434"), "gpu-box:11434");
    }
}
