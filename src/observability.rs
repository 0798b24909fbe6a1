use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("claimsai.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("claimsai.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("claimsai.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("claimsai.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("claimsai.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("claimsai.stream.bytes");

pub(crate) static SESSION_TURNS_COMPLETED: Counter =
    Counter::new("claimsai.session.turns_completed");
pub(crate) static SESSION_TURNS_FAILED: Counter = Counter::new("claimsai.session.turns_failed");
pub(crate) static SESSION_TURNS_STALE: Counter = Counter::new("claimsai.session.turns_stale");
pub(crate) static SESSION_SUBMITS_IGNORED: Counter =
    Counter::new("claimsai.session.submits_ignored");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("claimsai.session.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&SESSION_TURNS_COMPLETED);
    collector.register_counter(&SESSION_TURNS_FAILED);
    collector.register_counter(&SESSION_TURNS_STALE);
    collector.register_counter(&SESSION_SUBMITS_IGNORED);
    collector.register_moments(&SESSION_TURN_DURATION);
}
