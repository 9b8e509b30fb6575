//! Prometheus collectors for the node.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Calls submitted through `/call`, by operation and outcome code
pub static CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("oracle_guard_calls_total", "Signed calls processed"),
        &["op", "outcome"],
    )
    .expect("create calls counter");
    // ignore error if already registered
    let _ = REGISTRY.register(Box::new(c.clone()));
    c
});

/// Oracle reads by result: found, not_found, halted, unavailable
pub static READS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("oracle_guard_reads_total", "Oracle reads through the proxy"),
        &["result"],
    )
    .expect("create reads counter");
    let _ = REGISTRY.register(Box::new(c.clone()));
    c
});

pub static GUARDIANS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("oracle_guard_guardians", "Current guardian count")
        .expect("create guardians gauge");
    let _ = REGISTRY.register(Box::new(g.clone()));
    g
});

pub static PAUSED: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("oracle_guard_paused", "1 while oracle reads are halted")
        .expect("create paused gauge");
    let _ = REGISTRY.register(Box::new(g.clone()));
    g
});

pub fn record_call(op: &str, outcome: &str) {
    CALLS_TOTAL.with_label_values(&[op, outcome]).inc();
}

pub fn record_read(result: &str) {
    READS_TOTAL.with_label_values(&[result]).inc();
}

pub fn set_state(guardians: usize, paused: bool) {
    GUARDIANS.set(guardians as i64);
    PAUSED.set(i64::from(paused));
}

/// Text exposition of every registered collector
pub fn render() -> String {
    // touch the statics so they are registered before the first scrape
    Lazy::force(&CALLS_TOTAL);
    Lazy::force(&READS_TOTAL);
    Lazy::force(&GUARDIANS);
    Lazy::force(&PAUSED);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer).ok();
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_collectors() {
        record_call("pause", "ok");
        set_state(2, true);
        let text = render();
        assert!(text.contains("oracle_guard_calls_total"));
        assert!(text.contains("oracle_guard_guardians"));
        assert!(text.contains("oracle_guard_paused"));
    }
}
