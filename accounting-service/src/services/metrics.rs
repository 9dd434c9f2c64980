use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static LOGIN_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static AUTHZ_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

static INIT: Mutex<()> = Mutex::new(());

/// Registers every collector once. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let request_duration = HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request duration in seconds"),
        &["method", "path", "status"],
    )?;
    let login_attempts = IntCounterVec::new(
        Opts::new("login_attempts_total", "Login attempts by outcome and principal kind"),
        &["outcome", "kind"],
    )?;
    let authz_decisions = IntCounterVec::new(
        Opts::new("authz_decisions_total", "Authorization decisions by action"),
        &["action", "decision"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(login_attempts.clone()))?;
    registry.register(Box::new(authz_decisions.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = LOGIN_ATTEMPTS_TOTAL.set(login_attempts);
    let _ = AUTHZ_DECISIONS_TOTAL.set(authz_decisions);
    Ok(())
}

pub fn record_login(outcome: &str, kind: &str) {
    if let Some(counter) = LOGIN_ATTEMPTS_TOTAL.get() {
        counter.with_label_values(&[outcome, kind]).inc();
    }
}

pub fn record_authz(action: &str, allowed: bool) {
    if let Some(counter) = AUTHZ_DECISIONS_TOTAL.get() {
        let decision = if allowed { "allow" } else { "deny" };
        counter.with_label_values(&[action, decision]).inc();
    }
}

pub fn record_http(method: &str, path: &str, status: &str, seconds: f64) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path, status])
            .observe(seconds);
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_exposition() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_login("success", "service");
        record_authz("create_user", false);

        let text = get_metrics();
        assert!(text.contains("login_attempts_total"));
        assert!(text.contains("authz_decisions_total"));
    }
}
