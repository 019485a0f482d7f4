//! Platform collaborators of the verification-code receiver.
//!
//! Every contract comes with an in-process implementation used by tests and
//! the smoke binary.

pub mod client;
pub mod hub;
pub mod metrics;
pub mod prompt;
pub mod provider;

pub use client::{
    RetrievalCompleter, RetrievalTask, RetrieverClient, ScriptedRetrieval, ScriptedRetrieverClient,
};
pub use hub::{LocalNotificationHub, NotificationHub, NotificationSink, SubscriptionId};
pub use metrics::{HistogramSample, InMemoryMetricsSink, MetricsSink, TracingMetricsSink};
pub use prompt::{
    PromptCompleter, PromptCompletion, PromptError, PromptHost, ScriptedPrompt, ScriptedPromptHost,
};
pub use provider::{ProviderCall, RecordingProvider, SmsProvider};
