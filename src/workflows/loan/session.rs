use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{ApplicantId, ConversationSession};

/// Error enumeration for session-store failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session record not found")]
    NotFound,
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction owning conversation-session lifecycle, so the workflow
/// service can be exercised in isolation and a persistent backend can be
/// swapped in without touching workflow logic.
pub trait SessionStore: Send + Sync {
    /// Insert the session, superseding any existing one for the same
    /// applicant. No two sessions for one applicant ever coexist.
    fn create_or_replace(&self, session: ConversationSession) -> Result<(), SessionStoreError>;
    fn get(&self, applicant_id: &ApplicantId)
        -> Result<Option<ConversationSession>, SessionStoreError>;
    /// Overwrite an existing session; fails with `NotFound` when absent.
    fn update(&self, session: ConversationSession) -> Result<(), SessionStoreError>;
    fn delete(&self, applicant_id: &ApplicantId) -> Result<(), SessionStoreError>;
}

/// Process-local store backed by a mutex-guarded map. Individual operations
/// are atomic; per-applicant call ordering is the transport layer's job.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<ApplicantId, ConversationSession>>,
}

impl InMemorySessionStore {
    fn guard(&self) -> Result<MutexGuard<'_, HashMap<ApplicantId, ConversationSession>>, SessionStoreError> {
        self.sessions
            .lock()
            .map_err(|_| SessionStoreError::Unavailable("session mutex poisoned".to_string()))
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_or_replace(&self, session: ConversationSession) -> Result<(), SessionStoreError> {
        let mut guard = self.guard()?;
        guard.insert(session.applicant_id.clone(), session);
        Ok(())
    }

    fn get(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<ConversationSession>, SessionStoreError> {
        let guard = self.guard()?;
        Ok(guard.get(applicant_id).cloned())
    }

    fn update(&self, session: ConversationSession) -> Result<(), SessionStoreError> {
        let mut guard = self.guard()?;
        if guard.contains_key(&session.applicant_id) {
            guard.insert(session.applicant_id.clone(), session);
            Ok(())
        } else {
            Err(SessionStoreError::NotFound)
        }
    }

    fn delete(&self, applicant_id: &ApplicantId) -> Result<(), SessionStoreError> {
        let mut guard = self.guard()?;
        match guard.remove(applicant_id) {
            Some(_) => Ok(()),
            None => Err(SessionStoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::loan::domain::ConversationStep;

    fn applicant() -> ApplicantId {
        ApplicantId("USR001".to_string())
    }

    #[test]
    fn create_or_replace_supersedes_prior_session() {
        let store = InMemorySessionStore::default();
        let mut first = ConversationSession::new(applicant());
        first.advance(ConversationStep::AwaitingFinalConfirmation);
        store.create_or_replace(first).expect("insert");

        let fresh = ConversationSession::new(applicant());
        store.create_or_replace(fresh).expect("replace");

        let stored = store.get(&applicant()).expect("get").expect("present");
        assert_eq!(stored.step, ConversationStep::AwaitingGreeting);
    }

    #[test]
    fn update_requires_existing_session() {
        let store = InMemorySessionStore::default();
        let session = ConversationSession::new(applicant());
        assert!(matches!(
            store.update(session.clone()),
            Err(SessionStoreError::NotFound)
        ));

        store.create_or_replace(session.clone()).expect("insert");
        store.update(session).expect("update succeeds once present");
    }

    #[test]
    fn delete_removes_the_session() {
        let store = InMemorySessionStore::default();
        store
            .create_or_replace(ConversationSession::new(applicant()))
            .expect("insert");
        store.delete(&applicant()).expect("delete");
        assert!(store.get(&applicant()).expect("get").is_none());
        assert!(matches!(
            store.delete(&applicant()),
            Err(SessionStoreError::NotFound)
        ));
    }
}
