use std::{
    collections::VecDeque,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::sync::oneshot;
use webotp_core::RetrieverFailure;

/// Pending completion of one browser-code retriever start.
#[derive(Debug)]
pub struct RetrievalTask {
    rx: oneshot::Receiver<Result<(), RetrieverFailure>>,
}

/// Completes the paired [`RetrievalTask`].
#[derive(Debug)]
pub struct RetrievalCompleter {
    tx: oneshot::Sender<Result<(), RetrieverFailure>>,
}

impl RetrievalTask {
    /// Create a pending task with its completer.
    pub fn pending() -> (RetrievalCompleter, Self) {
        let (tx, rx) = oneshot::channel();
        (RetrievalCompleter { tx }, Self { rx })
    }

    /// A task that has already completed.
    pub fn completed(outcome: Result<(), RetrieverFailure>) -> Self {
        let (completer, task) = Self::pending();
        completer.complete(outcome);
        task
    }

    /// Wait for the outcome. `None` when the completer was dropped unfinished.
    pub async fn outcome(self) -> Option<Result<(), RetrieverFailure>> {
        self.rx.await.ok()
    }
}

impl RetrievalCompleter {
    /// Returns `false` when nobody waits on the task anymore.
    pub fn complete(self, outcome: Result<(), RetrieverFailure>) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

/// Platform client able to start the browser-code retriever.
pub trait RetrieverClient: Send + Sync {
    fn start_browser_code_retriever(&self) -> RetrievalTask;
}

/// One scripted answer of [`ScriptedRetrieverClient`].
#[derive(Debug, Clone)]
pub enum ScriptedRetrieval {
    /// Complete immediately with the outcome.
    Complete(Result<(), RetrieverFailure>),
    /// Keep the task pending until [`ScriptedRetrieverClient::complete_held`].
    Hold,
    /// Drop the completer so the task never yields an outcome.
    Abandon,
}

/// Client answering starts from a script, then holding further starts open.
#[derive(Debug, Default)]
pub struct ScriptedRetrieverClient {
    script: Mutex<VecDeque<ScriptedRetrieval>>,
    held: Mutex<VecDeque<RetrievalCompleter>>,
    starts: AtomicUsize,
}

impl ScriptedRetrieverClient {
    pub fn new(script: impl IntoIterator<Item = ScriptedRetrieval>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Client whose every start completes with `outcome`, once per entry.
    pub fn completing(outcomes: impl IntoIterator<Item = Result<(), RetrieverFailure>>) -> Self {
        Self::new(outcomes.into_iter().map(ScriptedRetrieval::Complete))
    }

    /// Number of retriever starts so far.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of starts still pending.
    pub fn held(&self) -> usize {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Complete the oldest held task. Returns `false` when none was held or
    /// its waiter is gone.
    pub fn complete_held(&self, outcome: Result<(), RetrieverFailure>) -> bool {
        let completer = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        completer.is_some_and(|completer| completer.complete(outcome))
    }
}

impl RetrieverClient for ScriptedRetrieverClient {
    fn start_browser_code_retriever(&self) -> RetrievalTask {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(ScriptedRetrieval::Hold);

        match next {
            ScriptedRetrieval::Complete(outcome) => RetrievalTask::completed(outcome),
            ScriptedRetrieval::Hold => {
                let (completer, task) = RetrievalTask::pending();
                self.held
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(completer);
                task
            }
            ScriptedRetrieval::Abandon => {
                let (_, task) = RetrievalTask::pending();
                task
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use webotp_core::StatusCode;

    use super::*;

    #[tokio::test]
    async fn completed_task_yields_outcome() {
        let task = RetrievalTask::completed(Err(RetrieverFailure::api(StatusCode::TIMEOUT)));
        assert_eq!(
            task.outcome().await,
            Some(Err(RetrieverFailure::api(StatusCode::TIMEOUT)))
        );
    }

    #[tokio::test]
    async fn dropped_completer_yields_none() {
        let (completer, task) = RetrievalTask::pending();
        drop(completer);
        assert_eq!(task.outcome().await, None);
    }

    #[tokio::test]
    async fn scripted_client_follows_script_then_holds() {
        let client = ScriptedRetrieverClient::completing([Ok(())]);

        let first = client.start_browser_code_retriever();
        assert_eq!(first.outcome().await, Some(Ok(())));

        let second = client.start_browser_code_retriever();
        assert_eq!(client.starts(), 2);
        assert_eq!(client.held(), 1);

        assert!(client.complete_held(Err(RetrieverFailure::api(
            StatusCode::API_NOT_AVAILABLE
        ))));
        assert_eq!(
            second.outcome().await,
            Some(Err(RetrieverFailure::api(StatusCode::API_NOT_AVAILABLE)))
        );
        assert!(!client.complete_held(Ok(())));
    }

    #[tokio::test]
    async fn abandoned_start_never_yields_an_outcome() {
        let client = ScriptedRetrieverClient::new([ScriptedRetrieval::Abandon]);
        let task = client.start_browser_code_retriever();

        assert_eq!(task.outcome().await, None);
        assert_eq!(client.starts(), 1);
        assert_eq!(client.held(), 0);
    }
}
