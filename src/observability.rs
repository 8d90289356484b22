use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("palaver.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("palaver.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("palaver.client.request_duration_seconds");

pub(crate) static HUB_DOWNLOADS: Counter = Counter::new("palaver.hub.downloads");
pub(crate) static HUB_DOWNLOAD_BYTES: Counter = Counter::new("palaver.hub.download_bytes");

pub(crate) static SESSION_MESSAGES: Counter = Counter::new("palaver.session.messages");
pub(crate) static SESSION_GENERATION_ERRORS: Counter =
    Counter::new("palaver.session.generation_errors");
pub(crate) static SESSION_CLEARS: Counter = Counter::new("palaver.session.clears");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("palaver.session.turn_duration_seconds");

pub(crate) static WEB_CHAT_REQUESTS: Counter = Counter::new("palaver.web.chat_requests");
pub(crate) static WEB_NOT_READY: Counter = Counter::new("palaver.web.not_ready");
pub(crate) static WEB_BAD_REQUESTS: Counter = Counter::new("palaver.web.bad_requests");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&HUB_DOWNLOADS);
    collector.register_counter(&HUB_DOWNLOAD_BYTES);

    collector.register_counter(&SESSION_MESSAGES);
    collector.register_counter(&SESSION_GENERATION_ERRORS);
    collector.register_counter(&SESSION_CLEARS);
    collector.register_moments(&SESSION_TURN_DURATION);

    collector.register_counter(&WEB_CHAT_REQUESTS);
    collector.register_counter(&WEB_NOT_READY);
    collector.register_counter(&WEB_BAD_REQUESTS);
}

/// Install a `tracing` subscriber that writes to stderr.
///
/// `RUST_LOG` takes precedence over `default_directives`.
pub fn init_tracing(default_directives: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
