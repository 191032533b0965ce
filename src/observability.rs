use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("courtside.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("courtside.client.request_errors");
pub(crate) static CLIENT_UPLOADS: Counter = Counter::new("courtside.client.uploads");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("courtside.client.request_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("courtside.stream.bytes");
pub(crate) static STREAM_FRAMES: Counter = Counter::new("courtside.stream.frames");
pub(crate) static STREAM_DISCARDED_BYTES: Counter =
    Counter::new("courtside.stream.discarded_bytes");

pub(crate) static DISPATCH_EVENTS: Counter = Counter::new("courtside.dispatch.events");
pub(crate) static DISPATCH_PARSE_ERRORS: Counter = Counter::new("courtside.dispatch.parse_errors");
pub(crate) static DISPATCH_UNRECOGNIZED: Counter = Counter::new("courtside.dispatch.unrecognized");
pub(crate) static DISPATCH_IGNORED: Counter = Counter::new("courtside.dispatch.ignored");

pub(crate) static TURNS: Counter = Counter::new("courtside.turn.count");
pub(crate) static TURN_FAILURES: Counter = Counter::new("courtside.turn.failures");
pub(crate) static TURN_DURATION: Moments = Moments::new("courtside.turn.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_UPLOADS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_DISCARDED_BYTES);

    collector.register_counter(&DISPATCH_EVENTS);
    collector.register_counter(&DISPATCH_PARSE_ERRORS);
    collector.register_counter(&DISPATCH_UNRECOGNIZED);
    collector.register_counter(&DISPATCH_IGNORED);

    collector.register_counter(&TURNS);
    collector.register_counter(&TURN_FAILURES);
    collector.register_moments(&TURN_DURATION);
}
