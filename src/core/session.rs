//! One interactive session: the configuration a user has entered so
//! far, the conversation transcript and a handle to the shared resource
//! cache.

use std::sync::Arc;

use serde::Serialize;

use super::cache::ResourceCache;
use super::error::SessionError;
use super::gate::{Configuration, Validation, validate};
use crate::ai::chat::models::{Transcript, TranscriptEntry};
use crate::ai::responder::{Request, Responder};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingConfig,
    Ready,
    Processing,
}

/// Marks a session as processing for as long as a turn is in flight
/// and settles the state when the turn ends, including when it's
/// dropped partway through.
struct Turn<'a> {
    state: &'a mut SessionState,
    after: SessionState,
}

impl<'a> Turn<'a> {
    fn start(state: &'a mut SessionState) -> Self {
        *state = SessionState::Processing;
        Self {
            state,
            after: SessionState::Ready,
        }
    }

    fn finish_as(&mut self, after: SessionState) {
        self.after = after;
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        *self.state = self.after;
    }
}

pub struct Session<R: Responder> {
    responder: Arc<R>,
    config: Configuration,
    transcript: Transcript,
    cache: Arc<ResourceCache<R::Resource>>,
    state: SessionState,
}

impl<R: Responder> Session<R> {
    pub fn new(
        responder: Arc<R>,
        cache: Arc<ResourceCache<R::Resource>>,
        config: Configuration,
    ) -> Self {
        let transcript = Transcript::new(TranscriptEntry::assistant(&responder.greeting()));
        let mut session = Self {
            responder,
            config,
            transcript,
            cache,
            state: SessionState::AwaitingConfig,
        };
        session.refresh_state();
        session
    }

    fn refresh_state(&mut self) -> Validation {
        let validation = self.validation();
        self.state = if validation.is_complete() {
            SessionState::Ready
        } else {
            SessionState::AwaitingConfig
        };
        validation
    }

    /// Replaces the configuration and re-checks it.
    pub fn configure(&mut self, config: Configuration) -> Validation {
        tracing::info!(
            "Configuring {} session with {:?}",
            self.responder.name(),
            config.field_names()
        );
        self.config = config;
        self.refresh_state()
    }

    pub fn validation(&self) -> Validation {
        validate(&self.config, self.responder.required_fields())
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        self.transcript.entries()
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    /// Runs one request through the session and returns the entry it
    /// added for the answer.
    ///
    /// An incomplete configuration or a resource that can't be built
    /// is returned as an error and leaves the transcript untouched.
    /// Otherwise the user entry and its answer are recorded together: a
    /// failed response becomes a single assistant entry flagged as an
    /// error. A turn dropped before it finishes records nothing and
    /// leaves the session ready.
    pub async fn submit(&mut self, request: Request) -> Result<&TranscriptEntry, SessionError> {
        self.refresh_state().into_result()?;

        let Self {
            responder,
            config,
            transcript,
            cache,
            state,
        } = self;
        let responder = &*responder;
        let mut turn = Turn::start(state);

        let resource = match cache
            .get_or_create(config, |config| responder.connect(config))
            .await
        {
            Ok(resource) => resource,
            Err(e) => {
                turn.finish_as(SessionState::AwaitingConfig);
                return Err(e);
            }
        };

        let entry = match responder
            .respond(&request, &resource, transcript.entries())
            .await
        {
            Ok(answer) => TranscriptEntry::assistant(&answer),
            Err(e) => {
                tracing::warn!("{} request failed: {}", responder.name(), e);
                TranscriptEntry::error(&e.to_string())
            }
        };
        transcript.push(TranscriptEntry::user(&request.text));
        transcript.push(entry);
        drop(turn);

        self.transcript
            .last()
            .ok_or_else(|| SessionError::ResponderFailed("Transcript is empty".to_string()))
    }

    /// Starts the conversation over from the greeting.
    pub fn clear(&mut self) {
        self.transcript
            .reset(TranscriptEntry::assistant(&self.responder.greeting()));
    }
}
