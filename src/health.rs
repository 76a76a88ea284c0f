//! Readiness of the relational store and the cache backend.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::service::CatalogService;

pub const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Unavailable,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_outcome<E: std::fmt::Display>(
        started: Instant,
        outcome: Result<Result<(), E>, tokio::time::error::Elapsed>,
    ) -> Self {
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some(format!("timed out after {CHECK_TIMEOUT:?}")),
        };
        match error {
            None => Self {
                status: HealthStatus::Ok,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Some(error) => {
                Self { status: HealthStatus::Unavailable, latency_ms: None, error: Some(error) }
            },
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub store: ComponentHealth,
    pub cache: ComponentHealth,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Pings both backends concurrently, each bounded by [`CHECK_TIMEOUT`].
pub async fn check(catalog: &CatalogService) -> HealthReport {
    let store = async {
        let started = Instant::now();
        let outcome = tokio::time::timeout(CHECK_TIMEOUT, catalog.store().ping()).await;
        ComponentHealth::from_outcome(started, outcome)
    };
    let cache = async {
        let started = Instant::now();
        let outcome = tokio::time::timeout(CHECK_TIMEOUT, catalog.cache().store().ping()).await;
        ComponentHealth::from_outcome(started, outcome)
    };
    let (store, cache) = tokio::join!(store, cache);

    let status = if store.status == HealthStatus::Ok && cache.status == HealthStatus::Ok {
        HealthStatus::Ok
    } else {
        HealthStatus::Unavailable
    };
    HealthReport { status, store, cache }
}

/// Polls [`check`] in the background; readers see the latest report without
/// touching either backend.
#[derive(Clone, Debug)]
pub struct HealthMonitor {
    latest: watch::Receiver<HealthReport>,
}

impl HealthMonitor {
    /// Runs one check before returning, then polls every `interval` until every
    /// monitor handle is dropped.
    pub async fn start(catalog: CatalogService, interval: Duration) -> Self {
        let (tx, latest) = watch::channel(check(&catalog).await);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {},
                }
                let report = check(&catalog).await;
                let was_ok = tx.borrow().is_ok();
                match (was_ok, report.is_ok()) {
                    (true, false) => warn!(?report, "backend health degraded"),
                    (false, true) => info!("backend health recovered"),
                    _ => {},
                }
                tx.send_replace(report);
            }
        });

        Self { latest }
    }

    pub fn latest(&self) -> HealthReport {
        self.latest.borrow().clone()
    }

    #[cfg(test)]
    pub async fn changed(&mut self) -> HealthReport {
        let _ = self.latest.changed().await;
        self.latest.borrow_and_update().clone()
    }
}
