use crate::{
    error::ReceiverError,
    types::{ReceiverEvent, ReceiverLifecycleState, SessionId},
};

/// Lifecycle of one receiver: the destroyed flag plus the current session.
#[derive(Debug, Clone)]
pub struct ReceiverStateMachine {
    state: ReceiverLifecycleState,
    current_session: Option<SessionId>,
    next_session: u64,
}

impl Default for ReceiverStateMachine {
    fn default() -> Self {
        Self {
            state: ReceiverLifecycleState::Idle,
            current_session: None,
            next_session: 1,
        }
    }
}

impl ReceiverStateMachine {
    pub fn state(&self) -> ReceiverLifecycleState {
        self.state
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.current_session
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == ReceiverLifecycleState::Destroyed
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        self.current_session == Some(session)
    }

    /// Start a new retrieval session, superseding the current one.
    pub fn begin_session(
        &mut self,
        is_local_request: bool,
    ) -> Result<(SessionId, Vec<ReceiverEvent>), ReceiverError> {
        if self.is_destroyed() {
            return Err(ReceiverError::invalid_state(self.state, "listen"));
        }

        let session = SessionId(self.next_session);
        self.next_session += 1;
        self.current_session = Some(session);

        let mut events = vec![ReceiverEvent::SessionStarted {
            session,
            is_local_request,
        }];
        events.extend(self.transition(ReceiverLifecycleState::Retrieving));
        Ok((session, events))
    }

    /// The retriever task of `session` completed.
    ///
    /// Completions of superseded sessions leave the state untouched.
    pub fn settle_session(&mut self, session: SessionId) -> Vec<ReceiverEvent> {
        if self.state != ReceiverLifecycleState::Retrieving || !self.is_current(session) {
            return Vec::new();
        }
        self.transition(ReceiverLifecycleState::Idle)
            .into_iter()
            .collect()
    }

    /// A permission prompt is showing for `session`.
    pub fn await_permission(&mut self, session: SessionId) -> Vec<ReceiverEvent> {
        if self.is_destroyed() || !self.is_current(session) {
            return Vec::new();
        }
        self.transition(ReceiverLifecycleState::AwaitingPermission)
            .into_iter()
            .collect()
    }

    /// The permission prompt completed or was abandoned.
    pub fn resolve_permission(&mut self) -> Vec<ReceiverEvent> {
        if self.state != ReceiverLifecycleState::AwaitingPermission {
            return Vec::new();
        }
        self.transition(ReceiverLifecycleState::Idle)
            .into_iter()
            .collect()
    }

    /// Flip to `Destroyed`. Returns no events when already destroyed.
    pub fn destroy(&mut self) -> Vec<ReceiverEvent> {
        if self.is_destroyed() {
            return Vec::new();
        }
        self.transition(ReceiverLifecycleState::Destroyed)
            .into_iter()
            .collect()
    }

    fn transition(&mut self, next: ReceiverLifecycleState) -> Option<ReceiverEvent> {
        if self.state == next {
            return None;
        }
        self.state = next;
        Some(ReceiverEvent::StateChanged { state: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_happy_path_state_transitions() {
        let mut sm = ReceiverStateMachine::default();
        assert_eq!(sm.state(), ReceiverLifecycleState::Idle);

        let (session, events) = sm.begin_session(true).expect("listen must work");
        assert_eq!(session, SessionId(1));
        assert_eq!(
            events,
            vec![
                ReceiverEvent::SessionStarted {
                    session,
                    is_local_request: true
                },
                ReceiverEvent::StateChanged {
                    state: ReceiverLifecycleState::Retrieving
                },
            ]
        );

        sm.settle_session(session);
        assert_eq!(sm.state(), ReceiverLifecycleState::Idle);

        sm.await_permission(session);
        assert_eq!(sm.state(), ReceiverLifecycleState::AwaitingPermission);

        sm.resolve_permission();
        assert_eq!(sm.state(), ReceiverLifecycleState::Idle);
    }

    #[test]
    fn new_session_supersedes_the_current_one() {
        let mut sm = ReceiverStateMachine::default();
        let (first, _) = sm.begin_session(false).expect("first listen");
        let (second, events) = sm.begin_session(false).expect("second listen");

        assert_ne!(first, second);
        assert!(sm.is_current(second));
        assert_eq!(events.len(), 1, "state stays Retrieving");

        assert!(sm.settle_session(first).is_empty());
        assert_eq!(sm.state(), ReceiverLifecycleState::Retrieving);

        sm.settle_session(second);
        assert_eq!(sm.state(), ReceiverLifecycleState::Idle);
    }

    #[test]
    fn rejects_listen_after_destroy() {
        let mut sm = ReceiverStateMachine::default();
        sm.destroy();

        let err = sm
            .begin_session(true)
            .expect_err("listen should fail once destroyed");
        assert_eq!(err.code, "invalid_state_transition");
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut sm = ReceiverStateMachine::default();
        assert_eq!(
            sm.destroy(),
            vec![ReceiverEvent::StateChanged {
                state: ReceiverLifecycleState::Destroyed
            }]
        );
        assert!(sm.destroy().is_empty());
        assert!(sm.is_destroyed());
    }

    #[test]
    fn late_callbacks_do_not_revive_destroyed_receiver() {
        let mut sm = ReceiverStateMachine::default();
        let (session, _) = sm.begin_session(false).expect("listen");
        sm.destroy();

        assert!(sm.settle_session(session).is_empty());
        assert!(sm.await_permission(session).is_empty());
        assert!(sm.resolve_permission().is_empty());
        assert_eq!(sm.state(), ReceiverLifecycleState::Destroyed);
    }
}
