use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tokio::sync::oneshot;
use webotp_core::{PromptResult, ResolutionHandle};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("resolution unavailable: {0}")]
    ResolutionUnavailable(String),
    #[error("prompt launch failed: {0}")]
    LaunchFailed(String),
}

/// Suspended continuation of a shown permission prompt.
#[derive(Debug)]
pub struct PromptCompletion {
    rx: oneshot::Receiver<PromptResult>,
}

#[derive(Debug)]
pub struct PromptCompleter {
    tx: oneshot::Sender<PromptResult>,
}

impl PromptCompletion {
    pub fn pending() -> (PromptCompleter, Self) {
        let (tx, rx) = oneshot::channel();
        (PromptCompleter { tx }, Self { rx })
    }

    pub fn resolved(result: PromptResult) -> Self {
        let (completer, completion) = Self::pending();
        completer.complete(result);
        completion
    }

    /// Wait for the user's decision. `None` when the prompt went away without one.
    pub async fn result(self) -> Option<PromptResult> {
        self.rx.await.ok()
    }
}

impl PromptCompleter {
    pub fn complete(self, result: PromptResult) -> bool {
        self.tx.send(result).is_ok()
    }
}

/// Window able to present a resolution prompt.
pub trait PromptHost: Send + Sync {
    /// Launch the prompt for `handle`. Errors mean nothing was shown.
    fn show_prompt(&self, handle: &ResolutionHandle) -> Result<PromptCompletion, PromptError>;
}

#[derive(Debug, Clone)]
pub enum ScriptedPrompt {
    /// Show and complete at once with the result.
    Respond(PromptResult),
    /// Fail to launch.
    FailLaunch(PromptError),
    /// Show and keep open until [`ScriptedPromptHost::complete_held`].
    Hold,
    /// Show, then go away without a result.
    Dismiss,
}

/// Prompt host answering from a script; unscripted prompts are held open.
#[derive(Debug, Default)]
pub struct ScriptedPromptHost {
    script: Mutex<VecDeque<ScriptedPrompt>>,
    held: Mutex<VecDeque<PromptCompleter>>,
    shown: Mutex<Vec<ResolutionHandle>>,
}

impl ScriptedPromptHost {
    pub fn new(script: impl IntoIterator<Item = ScriptedPrompt>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Handles of every prompt launch attempt, in order.
    pub fn shown(&self) -> Vec<ResolutionHandle> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn complete_held(&self, result: PromptResult) -> bool {
        let completer = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        completer.is_some_and(|completer| completer.complete(result))
    }
}

impl PromptHost for ScriptedPromptHost {
    fn show_prompt(&self, handle: &ResolutionHandle) -> Result<PromptCompletion, PromptError> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle.clone());

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(ScriptedPrompt::Hold);

        match next {
            ScriptedPrompt::Respond(result) => Ok(PromptCompletion::resolved(result)),
            ScriptedPrompt::FailLaunch(err) => Err(err),
            ScriptedPrompt::Hold => {
                let (completer, completion) = PromptCompletion::pending();
                self.held
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(completer);
                Ok(completion)
            }
            ScriptedPrompt::Dismiss => {
                let (_, completion) = PromptCompletion::pending();
                Ok(completion)
            }
        }
    }
}
