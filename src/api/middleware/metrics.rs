use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;
use utoipa::ToSchema;

/// Request statistics reported by `/.status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusReport {
    pub pid: u32,
    pub uptime_sec: u64,
    pub total_count: u64,
    pub status_code_count: BTreeMap<String, u64>,
    pub total_response_time_ms: u64,
    pub average_response_time_ms: f64,
    pub version: String,
}

#[derive(Default)]
struct Counters {
    total_count: u64,
    status_code_count: BTreeMap<u16, u64>,
    total_response_time: Duration,
}

/// Process-wide request counters.
pub struct RequestStats {
    started: Instant,
    counters: Mutex<Counters>,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn record(&self, status: u16, latency: Duration) {
        // A poisoned lock only means another request panicked mid-update
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.total_count += 1;
        *counters.status_code_count.entry(status).or_default() += 1;
        counters.total_response_time += latency;
    }

    pub fn report(&self) -> StatusReport {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let total_ms = u64::try_from(counters.total_response_time.as_millis()).unwrap_or(u64::MAX);
        let average = if counters.total_count == 0 {
            0.0
        } else {
            counters.total_response_time.as_secs_f64() * 1000.0 / counters.total_count as f64
        };

        StatusReport {
            pid: std::process::id(),
            uptime_sec: self.started.elapsed().as_secs(),
            total_count: counters.total_count,
            status_code_count: counters
                .status_code_count
                .iter()
                .map(|(code, count)| (code.to_string(), *count))
                .collect(),
            total_response_time_ms: total_ms,
            average_response_time_ms: average,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub async fn metrics_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();
    state.stats.record(status.as_u16(), latency);

    info!(
        target: "metrics",
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "request_completed"
    );

    response
}
