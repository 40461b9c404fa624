//! Invocation pathway from a surface to its remote operation and back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, error, info};
use vaultlab_api::{RemoteSource, TransportError, operation_url};
use vaultlab_registry::DebugLevel;
use vaultlab_types::{InvocationResponse, OperationId, RequestContext};
use vaultlab_util::truncate_for_summary;

use crate::host::{Host, HostError};
use crate::surface::SurfaceHandle;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request for {operation} failed: {source}")]
    Transport {
        operation: OperationId,
        #[source]
        source: TransportError,
    },

    #[error("{operation} reported an error: {message}")]
    Application { operation: OperationId, message: String },

    #[error("{operation} is not a conversation")]
    NotConversation { operation: OperationId },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// What happened to a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Applied to the document or the surface.
    Applied,
    /// The surface was torn down while the call was in flight.
    Discarded,
    /// Only the surface's slot was brought forward.
    Revealed,
}

/// Posts editing context to remote operations and routes their replies.
///
/// Calls are independent: two concurrent triggers make two requests.
pub struct Dispatcher {
    remote: Arc<dyn RemoteSource>,
    host: Host,
    server_url: String,
    /// Shared with focus listeners, which hold their own `Arc<Dispatcher>`.
    verbose: AtomicBool,
}

impl Dispatcher {
    pub fn new(remote: Arc<dyn RemoteSource>, host: Host, server_url: impl Into<String>, debug: DebugLevel) -> Self {
        Self {
            remote,
            host,
            server_url: server_url.into(),
            verbose: AtomicBool::new(debug.is_verbose()),
        }
    }

    pub fn debug(&self) -> DebugLevel {
        if self.is_verbose() { DebugLevel::Verbose } else { DebugLevel::Off }
    }

    /// Change request logging for every holder of this dispatcher.
    pub fn set_debug(&self, debug: DebugLevel) {
        self.verbose.store(debug.is_verbose(), Ordering::Relaxed);
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    /// Snapshot the editing context. `text` replaces the selection when given.
    pub fn build_context(&self, text: Option<String>) -> RequestContext {
        let text = text.or_else(|| self.host.editor.selection());
        RequestContext::new(self.host.vault.root())
            .with_note_path(self.host.editor.active_document())
            .with_text(text)
    }

    pub async fn invoke(&self, handle: &SurfaceHandle) -> Result<DispatchOutcome, DispatchError> {
        let context = self.build_context(None);
        self.dispatch(handle, context).await
    }

    /// Append a user line to a conversation, then send it as `text`.
    pub async fn submit(&self, handle: &SurfaceHandle, line: &str) -> Result<DispatchOutcome, DispatchError> {
        {
            let mut surface = handle.lock().await;
            let panel = surface.as_conversation_mut().ok_or_else(|| DispatchError::NotConversation {
                operation: handle.operation().id.clone(),
            })?;
            panel.push_user(line);
        }
        if handle.is_attached() {
            let view = handle.render().await;
            self.host.slots.present(handle.id(), &view);
        }

        let context = self.build_context(Some(line.to_string()));
        self.dispatch(handle, context).await
    }

    async fn dispatch(&self, handle: &SurfaceHandle, context: RequestContext) -> Result<DispatchOutcome, DispatchError> {
        let operation = handle.operation();
        let url = operation_url(&self.server_url, &operation.id);
        if self.is_verbose() {
            debug!(operation = %operation.id, %url, payload = ?context, "posting");
        }

        let body = match self.remote.post(&url, &context).await {
            Ok(body) => body,
            Err(source) => {
                error!(operation = %operation.id, error = %source, "remote call failed");
                self.host
                    .notifier
                    .notice(&format!("Lab: {} failed: {source}", operation.label()));
                return Err(DispatchError::Transport {
                    operation: operation.id.clone(),
                    source,
                });
            }
        };

        let response = InvocationResponse::from_value(body);
        if self.is_verbose() {
            debug!(
                operation = %operation.id,
                response = %truncate_for_summary(&response.raw().to_string(), 200),
                "received"
            );
        }
        if response.has_errors() {
            let message = response.error_message();
            error!(operation = %operation.id, response = %response.raw(), "remote reported errors");
            self.host.notifier.notice(&message);
            return Err(DispatchError::Application {
                operation: operation.id.clone(),
                message,
            });
        }

        if !handle.is_attached() {
            info!(operation = %operation.id, "surface torn down while in flight; response discarded");
            return Ok(DispatchOutcome::Discarded);
        }

        let view = {
            let mut surface = handle.lock().await;
            surface.as_view_mut().set_data(&response)?;
            handle.requires_slot().then(|| surface.as_view().render())
        };
        if let Some(view) = view {
            self.host.slots.present(handle.id(), &view);
        }
        Ok(DispatchOutcome::Applied)
    }
}
