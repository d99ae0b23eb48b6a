//! One user turn: optimistic append, a single outbound request, reply or error.
//!
//! `begin` does everything up to issuing the request and hands back a
//! [`PendingRequest`] that owns what it needs, so the caller can spawn it and
//! keep the UI responsive. `finish` applies the outcome. Only one request may
//! be outstanding; `begin` rejects a second one with [`ChatError::Busy`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::ChatBackend;
use crate::config::{Config, Credentials};
use crate::error::ChatError;
use crate::export::CsvExporter;
use crate::state::Message;
use crate::transcript::Transcript;

pub struct Exchange {
    transcript: Transcript,
    input: String,
    error: Option<String>,
    busy: bool,
    config: Config,
    backend: Arc<dyn ChatBackend>,
    exporter: CsvExporter,
}

/// An issued-but-unresolved request. `'static` so it can go to `tokio::spawn`.
pub struct PendingRequest {
    backend: Arc<dyn ChatBackend>,
    credentials: Credentials,
    message: String,
}

impl PendingRequest {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub async fn send(self) -> Result<String, ChatError> {
        self.backend
            .send(&self.credentials.endpoint, &self.credentials.api_key, &self.message)
            .await
    }
}

impl Exchange {
    pub fn new(config: Config, backend: Arc<dyn ChatBackend>, exporter: CsvExporter) -> Self {
        Self {
            transcript: Transcript::new(),
            input: String::new(),
            error: None,
            busy: false,
            config,
            backend,
            exporter,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Start a turn with `text`.
    ///
    /// Returns `Ok(None)` when nothing is sent: blank input (no side effects at
    /// all) or missing configuration (user message kept, error slot set).
    pub fn begin(&mut self, text: &str) -> Result<Option<PendingRequest>, ChatError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if self.busy {
            return Err(ChatError::Busy);
        }

        self.record(Message::user(text));
        self.input.clear();
        self.error = None;
        self.busy = true;

        let credentials = match self.config.credentials() {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "not sending, configuration incomplete");
                self.error = Some(e.user_message());
                self.busy = false;
                return Ok(None);
            }
        };

        Ok(Some(PendingRequest {
            backend: Arc::clone(&self.backend),
            credentials,
            message: text.to_string(),
        }))
    }

    /// Start a turn with the current input buffer. On rejection the buffer is left as is.
    pub fn begin_input(&mut self) -> Result<Option<PendingRequest>, ChatError> {
        let text = self.input.clone();
        self.begin(&text)
    }

    /// Apply the outcome of the request started by `begin`.
    pub fn finish(&mut self, result: Result<String, ChatError>) {
        if !self.busy {
            warn!("finish called with no request in flight, ignoring");
            return;
        }

        match result {
            Ok(reply) => {
                info!(len = reply.len(), "reply received");
                self.record(Message::assistant(reply));
            }
            Err(e) => {
                warn!(error = %e, "chat request failed");
                self.error = Some(e.user_message());
            }
        }
        self.busy = false;
    }

    /// `begin`, send and `finish` in one call. Exchange failures land in the
    /// error slot; only a busy rejection is returned.
    pub async fn submit(&mut self, text: &str) -> Result<(), ChatError> {
        if let Some(pending) = self.begin(text)? {
            let result = pending.send().await;
            self.finish(result);
        }
        Ok(())
    }

    pub async fn submit_input(&mut self) -> Result<(), ChatError> {
        let text = self.input.clone();
        self.submit(&text).await
    }

    fn record(&mut self, message: Message) {
        self.transcript.append(message);
        if let Some(appended) = self.transcript.last() {
            self.exporter.export(appended);
        }
    }
}
