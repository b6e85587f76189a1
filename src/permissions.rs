//! Microphone permission requests.
//!
//! The platform permission prompt is asynchronous: the controller asks, keeps
//! handling other events, and applies the answer when it arrives (or drops it
//! if the session has since closed).
//!
//! [`PermissionBroker`] is the implementation for hosts that own the actual
//! prompt: every request gets an id, the host is notified, and the request
//! resolves when the host answers through [`PermissionBroker::respond`].

use crate::error::{Result, VoiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Result of asking for microphone access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    Granted,
    Denied,
    /// The platform has no explicit permission prompt; capture may still
    /// fail later with a `NotAllowed` error.
    Unavailable,
}

/// Platform microphone permission system.
#[async_trait]
pub trait MicrophonePermission: Send + Sync {
    async fn request(&self) -> PermissionOutcome;
}

/// Answers every request the same way.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub PermissionOutcome);

#[async_trait]
impl MicrophonePermission for StaticPermission {
    async fn request(&self) -> PermissionOutcome {
        self.0
    }
}

type Announce = dyn Fn(&str) + Send + Sync;

/// Permission requests resolved by an external host.
#[derive(Clone)]
pub struct PermissionBroker {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>,
    announce: Arc<Announce>,
}

impl std::fmt::Debug for PermissionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionBroker")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl PermissionBroker {
    /// Create a broker that calls `announce(request_id)` for every new request.
    pub fn new(announce: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            announce: Arc::new(announce),
        }
    }

    /// Deliver the host's answer for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Session`] if no request with that id is pending.
    pub fn respond(&self, request_id: &str, granted: bool) -> Result<()> {
        let sender = self.lock().remove(request_id).ok_or_else(|| {
            VoiceError::Session(format!("no pending permission request {request_id}"))
        })?;
        info!(request_id, granted, "microphone permission answered");
        if sender.send(granted).is_err() {
            debug!(request_id, "permission requester went away before the answer");
        }
        Ok(())
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<bool>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MicrophonePermission for PermissionBroker {
    async fn request(&self) -> PermissionOutcome {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.lock().insert(request_id.clone(), tx);
        (self.announce)(&request_id);

        match rx.await {
            Ok(true) => PermissionOutcome::Granted,
            Ok(false) => PermissionOutcome::Denied,
            Err(_) => {
                debug!(request_id, "permission request dropped unanswered");
                PermissionOutcome::Denied
            }
        }
    }
}
