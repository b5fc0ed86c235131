//! Best-effort presence indicator transitions.
//!
//! Presence is cosmetic: every operation catches and logs its own failure and
//! never propagates it, so a broken indicator can never stall the pipeline.
//! No retries either.

use crate::transport::Chat;
use tracing::warn;

/// Shows the typing indicator.
pub async fn set_typing(chat: &dyn Chat) {
    if let Err(err) = chat.set_typing().await {
        warn!(error = %err, "failed to set typing state");
    }
}

/// Shows the recording indicator.
pub async fn set_recording(chat: &dyn Chat) {
    if let Err(err) = chat.set_recording().await {
        warn!(error = %err, "failed to set recording state");
    }
}

/// Clears any visible indicator.
pub async fn clear(chat: &dyn Chat) {
    if let Err(err) = chat.clear_state().await {
        warn!(error = %err, "failed to clear chat state");
    }
}
