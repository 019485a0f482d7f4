mod config;
mod logging;

use std::{process, sync::Arc};

use tokio::time::{Instant, timeout_at};
use tracing::{error, info, warn};
use webotp_core::{
    PromptResult, RawNotification, ReceiverEvent, ResolutionHandle, RetrieverFailure, StatusCode,
};
use webotp_platform::{
    InMemoryMetricsSink, LocalNotificationHub, MetricsSink, RecordingProvider, ScriptedPrompt,
    ScriptedPromptHost, ScriptedRetrieval, ScriptedRetrieverClient, TracingMetricsSink,
};
use webotp_receiver::{ReceiverDeps, spawn_receiver};

use crate::config::{Scenario, SmokeConfig};

/// Logs every sample and keeps a copy for the run summary.
#[derive(Clone, Default)]
struct SmokeMetrics {
    log: TracingMetricsSink,
    memory: InMemoryMetricsSink,
}

impl MetricsSink for SmokeMetrics {
    fn record_enumerated(&self, name: &str, sample: usize, boundary: usize) {
        self.log.record_enumerated(name, sample, boundary);
        self.memory.record_enumerated(name, sample, boundary);
    }
}

fn scripted_collaborators(scenario: Scenario) -> (Vec<ScriptedRetrieval>, Vec<ScriptedPrompt>) {
    let fail = |status| ScriptedRetrieval::Complete(Err(RetrieverFailure::api(status)));
    let resolvable = || {
        ScriptedRetrieval::Complete(Err(RetrieverFailure::resolvable(
            StatusCode::RESOLUTION_REQUIRED,
            ResolutionHandle::new(),
        )))
    };

    match scenario {
        Scenario::Code | Scenario::Timeout => (vec![ScriptedRetrieval::Hold], vec![]),
        Scenario::NotConnected => (vec![fail(StatusCode::API_NOT_CONNECTED)], vec![]),
        Scenario::PlatformNotSupported => (vec![fail(StatusCode::PLATFORM_NOT_SUPPORTED)], vec![]),
        Scenario::NotAvailable => (vec![fail(StatusCode::API_NOT_AVAILABLE)], vec![]),
        Scenario::PermissionRequired => (vec![fail(StatusCode::USER_PERMISSION_REQUIRED)], vec![]),
        Scenario::ResolutionGranted => (
            vec![resolvable(), ScriptedRetrieval::Complete(Ok(()))],
            vec![ScriptedPrompt::Respond(PromptResult::OK)],
        ),
        Scenario::ResolutionDenied => (
            vec![resolvable()],
            vec![ScriptedPrompt::Respond(PromptResult::CANCELED)],
        ),
    }
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = match SmokeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid smoke configuration: {err}");
            process::exit(2);
        }
    };
    info!(
        scenario = ?config.scenario,
        is_local_request = config.is_local_request,
        "starting smoke run"
    );

    let (retrievals, prompts) = scripted_collaborators(config.scenario);
    let client = Arc::new(ScriptedRetrieverClient::new(retrievals));
    let provider = RecordingProvider::new(client);
    let hub = LocalNotificationHub::default();
    let metrics = SmokeMetrics::default();
    let window = Arc::new(ScriptedPromptHost::new(prompts));

    let handle = spawn_receiver(
        ReceiverDeps {
            provider: Arc::new(provider.clone()),
            hub: Arc::new(hub.clone()),
            metrics: Arc::new(metrics.clone()),
        },
        config.receiver.clone(),
    );
    let mut events = handle.subscribe();

    if let Err(err) = handle.listen(window, config.is_local_request).await {
        error!(error = %err, "listen failed");
        process::exit(1);
    }

    let deadline = Instant::now() + config.wait;
    let mut sessions_until_notify = config.scenario.sessions_before_notification();
    loop {
        let event = match timeout_at(deadline, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                warn!(error = %err, "event stream interrupted");
                break;
            }
            Err(_) => break,
        };
        println!("event: {event:?}");

        if matches!(event, ReceiverEvent::SessionStarted { .. }) && sessions_until_notify > 0 {
            sessions_until_notify -= 1;
            if sessions_until_notify == 0 {
                let notification = match config.scenario {
                    Scenario::Timeout => RawNotification::code_retrieved(StatusCode::TIMEOUT, None),
                    _ => RawNotification::code_retrieved(StatusCode::SUCCESS, Some(&config.code)),
                };
                let sinks = hub.broadcast(notification);
                info!(sinks, "code-retrieved notification broadcast");
            }
        }
    }

    if let Err(err) = handle.destroy().await {
        error!(error = %err, "destroy failed");
    }
    handle.shutdown();

    println!("provider calls: {:?}", provider.outcomes());
    println!("availability samples: {:?}", metrics.memory.samples());
    println!(
        "hub registrations: {} unregistrations: {}",
        hub.registrations(),
        hub.unregistrations()
    );
}
