use std::sync::{Arc, PoisonError, RwLock};

use webotp_core::GmsBackend;

use crate::client::RetrieverClient;

/// Owner of the WebOTP request; receives every outcome of the receiver.
pub trait SmsProvider: Send + Sync {
    fn on_receive(&self, code: &str, backend: GmsBackend);

    fn on_timeout(&self);

    fn on_cancel(&self);

    /// The retriever cannot serve this request; the caller may fall back.
    fn on_method_not_available(&self, is_local_request: bool);

    /// Client used to start one retrieval.
    fn client(&self) -> Arc<dyn RetrieverClient>;

    /// Drop the sibling user-consent receiver once verification works.
    fn discard_user_consent_receiver(&self);

    /// Drop this verification receiver after its task failed.
    fn discard_verification_receiver(&self);
}

/// Call observed by [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Receive { code: String, backend: GmsBackend },
    Timeout,
    Cancel,
    MethodNotAvailable { is_local_request: bool },
    ClientRequested,
    DiscardUserConsentReceiver,
    DiscardVerificationReceiver,
}

/// Provider that records every call and hands out a fixed client.
#[derive(Clone)]
pub struct RecordingProvider {
    client: Arc<dyn RetrieverClient>,
    calls: Arc<RwLock<Vec<ProviderCall>>>,
}

impl RecordingProvider {
    pub fn new(client: Arc<dyn RetrieverClient>) -> Self {
        Self {
            client,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded calls without the `ClientRequested` bookkeeping.
    pub fn outcomes(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != ProviderCall::ClientRequested)
            .collect()
    }

    fn record(&self, call: ProviderCall) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl SmsProvider for RecordingProvider {
    fn on_receive(&self, code: &str, backend: GmsBackend) {
        self.record(ProviderCall::Receive {
            code: code.to_owned(),
            backend,
        });
    }

    fn on_timeout(&self) {
        self.record(ProviderCall::Timeout);
    }

    fn on_cancel(&self) {
        self.record(ProviderCall::Cancel);
    }

    fn on_method_not_available(&self, is_local_request: bool) {
        self.record(ProviderCall::MethodNotAvailable { is_local_request });
    }

    fn client(&self) -> Arc<dyn RetrieverClient> {
        self.record(ProviderCall::ClientRequested);
        Arc::clone(&self.client)
    }

    fn discard_user_consent_receiver(&self) {
        self.record(ProviderCall::DiscardUserConsentReceiver);
    }

    fn discard_verification_receiver(&self) {
        self.record(ProviderCall::DiscardVerificationReceiver);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptedRetrieverClient;

    #[test]
    fn records_calls_in_order() {
        let provider = RecordingProvider::new(Arc::new(ScriptedRetrieverClient::default()));
        let _client = provider.client();
        provider.on_receive("123456", GmsBackend::Verification);
        provider.on_method_not_available(false);

        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::ClientRequested,
                ProviderCall::Receive {
                    code: "123456".into(),
                    backend: GmsBackend::Verification,
                },
                ProviderCall::MethodNotAvailable {
                    is_local_request: false
                },
            ]
        );
        assert_eq!(provider.outcomes().len(), 2);
    }

    #[test]
    fn clones_share_the_call_log() {
        let provider = RecordingProvider::new(Arc::new(ScriptedRetrieverClient::default()));
        let clone = provider.clone();
        clone.on_timeout();
        assert_eq!(provider.calls(), vec![ProviderCall::Timeout]);
    }
}
