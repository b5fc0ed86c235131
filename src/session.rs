//! AI session state: the active-user set and per-user conversation history.
//!
//! Both caches evict idle entries after a TTL and are capacity-bounded, so
//! history growth is limited even for long-running deployments. Within one
//! session the history is additionally capped to a fixed number of turns.

use moka::future::Cache;
use std::time::Duration;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The human user.
    User,
    /// The AI backend.
    Model,
}

impl Role {
    /// Wire name used by the AI backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One conversation history entry.
#[derive(Debug, Clone)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub text: String,
}

/// Owner of the active-user set and per-user history.
pub struct SessionStore {
    active: Cache<String, ()>,
    history: Cache<String, Vec<Turn>>,
    max_turns: usize,
}

impl SessionStore {
    /// Creates a store evicting idle sessions after `ttl`, tracking at most
    /// `max_sessions` users and `max_turns` history entries per user.
    #[must_use]
    pub fn new(ttl: Duration, max_sessions: u64, max_turns: usize) -> Self {
        let active = Cache::builder()
            .max_capacity(max_sessions)
            .time_to_live(ttl)
            .build();
        let history = Cache::builder()
            .max_capacity(max_sessions)
            .time_to_live(ttl)
            .build();
        Self {
            active,
            history,
            max_turns,
        }
    }

    /// Marks a user as having an ongoing AI conversation.
    pub async fn mark_active(&self, user: &str) {
        self.active.insert(user.to_owned(), ()).await;
    }

    /// Whether the user currently has an ongoing AI conversation.
    pub async fn is_active(&self, user: &str) -> bool {
        self.active.get(user).await.is_some()
    }

    /// Ends a user's conversation and drops their history.
    pub async fn deactivate(&self, user: &str) {
        self.active.invalidate(user).await;
        self.history.invalidate(user).await;
    }

    /// The user's history, oldest turn first.
    pub async fn history(&self, user: &str) -> Vec<Turn> {
        self.history.get(user).await.unwrap_or_default()
    }

    /// Appends a turn, dropping the oldest entries beyond the cap.
    pub async fn push_turn(&self, user: &str, role: Role, text: &str) {
        let mut turns = self.history.get(user).await.unwrap_or_default();
        turns.push(Turn {
            role,
            text: text.to_owned(),
        });
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
        self.history.insert(user.to_owned(), turns).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(60), 100, 4)
    }

    #[tokio::test]
    async fn history_starts_empty() {
        assert!(store().history("alice").await.is_empty());
    }

    #[tokio::test]
    async fn history_is_capped_dropping_oldest() {
        let sessions = store();
        for i in 0..6 {
            sessions
                .push_turn("alice", Role::User, &format!("turn {i}"))
                .await;
        }
        let history = sessions.history("alice").await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].text, "turn 2");
        assert_eq!(history[3].text, "turn 5");
    }

    #[tokio::test]
    async fn deactivation_clears_state() {
        let sessions = store();
        sessions.mark_active("bob").await;
        sessions.push_turn("bob", Role::Model, "hi").await;
        assert!(sessions.is_active("bob").await);

        sessions.deactivate("bob").await;
        assert!(!sessions.is_active("bob").await);
        assert!(sessions.history("bob").await.is_empty());
    }

    #[tokio::test]
    async fn users_are_independent() {
        let sessions = store();
        sessions.push_turn("alice", Role::User, "hello").await;
        assert!(sessions.history("bob").await.is_empty());
        assert_eq!(sessions.history("alice").await.len(), 1);
    }
}
