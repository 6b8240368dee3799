//! The fusion task: single-threaded owner of the target map. Drains a
//! report channel and services query/snapshot requests from the controller
//! and display via a request/response channel, per the concurrency model.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::astro_math::Degrees;
use crate::config::LocationConfig;
use crate::counters::DropCounters;

use super::{Report, TargetStore};

#[derive(Debug, Clone)]
pub struct TargetSummary {
    pub id: String,
    pub name: Option<String>,
    pub is_space: bool,
    pub stale: bool,
    pub az: Degrees,
    pub el: Degrees,
}

/// Result of a query for one target: predicted az/el and whether the target
/// is currently flagged stale (grey on the display).
pub type QueryResult = Option<(Degrees, Degrees, bool)>;

enum FusionMsg {
    Report(Report),
    Query {
        id: String,
        at: DateTime<Utc>,
        reply: oneshot::Sender<QueryResult>,
    },
    Snapshot {
        at: DateTime<Utc>,
        reply: oneshot::Sender<Vec<TargetSummary>>,
    },
}

#[derive(Clone)]
pub struct FusionHandle {
    tx: mpsc::Sender<FusionMsg>,
}

impl FusionHandle {
    pub async fn report(&self, report: Report) {
        let _ = self.tx.send(FusionMsg::Report(report)).await;
    }

    pub async fn query(&self, id: &str, at: DateTime<Utc>) -> QueryResult {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(FusionMsg::Query {
                id: id.to_string(),
                at,
                reply,
            })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.unwrap_or(None)
    }

    pub async fn snapshot(&self, at: DateTime<Utc>) -> Vec<TargetSummary> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(FusionMsg::Snapshot { at, reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

pub fn spawn_fusion_task(
    observer: LocationConfig,
    silence_timeout: Duration,
    counters: Arc<DropCounters>,
    mut shutdown: broadcast::Receiver<()>,
) -> (FusionHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(256);

    let handle = tokio::spawn(async move {
        let mut store = TargetStore::new(observer, silence_timeout);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    match msg {
                        FusionMsg::Report(report) => {
                            store.apply_report(report, &counters);
                            store.sweep(Utc::now());
                        }
                        FusionMsg::Query { id, at, reply } => {
                            let result = store
                                .get_mut(&id)
                                .map(|target| {
                                    let (az, el) = target.predict_az_el(at);
                                    (az, el, target.stale)
                                });
                            let _ = reply.send(result);
                        }
                        FusionMsg::Snapshot { at, reply } => {
                            let summaries = store
                                .iter_mut()
                                .map(|target| {
                                    let (az, el) = target.predict_az_el(at);
                                    TargetSummary {
                                        id: target.id.clone(),
                                        name: target.name.clone(),
                                        is_space: target.is_space,
                                        stale: target.stale,
                                        az,
                                        el,
                                    }
                                })
                                .collect();
                            let _ = reply.send(summaries);
                        }
                    }
                }
            }
        }
    });

    (FusionHandle { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Report;

    fn observer() -> LocationConfig {
        LocationConfig {
            lat_degrees: 38.879084,
            lon_degrees: -77.036531,
            alt_meters: 18.0,
        }
    }

    #[tokio::test]
    async fn report_then_query_returns_a_prediction() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let counters = Arc::new(DropCounters::new());
        let (handle, _task) =
            spawn_fusion_task(observer(), Duration::from_secs(60), counters, shutdown_rx);

        let now = Utc::now();
        handle
            .report(Report::Aircraft {
                hex_ident: "ABC123".to_string(),
                callsign: None,
                timestamp: now,
                lat: 38.9,
                lon: -77.0,
                altitude_ft: Some(30000.0),
                ground_speed_kt: Some(450.0),
                track_deg: Some(90.0),
                vertical_rate_fpm: Some(0.0),
            })
            .await;

        // give the task a chance to drain the channel
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = handle.query("ABC123", now).await;
        assert!(result.is_some());

        let missing = handle.query("NOPE", now).await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn snapshot_lists_all_known_targets() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let counters = Arc::new(DropCounters::new());
        let (handle, _task) =
            spawn_fusion_task(observer(), Duration::from_secs(60), counters, shutdown_rx);

        let now = Utc::now();
        handle
            .report(Report::Aircraft {
                hex_ident: "D1".to_string(),
                callsign: None,
                timestamp: now,
                lat: 38.9,
                lon: -77.0,
                altitude_ft: Some(1000.0),
                ground_speed_kt: Some(100.0),
                track_deg: Some(0.0),
                vertical_rate_fpm: Some(0.0),
            })
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = handle.snapshot(now).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "D1");
    }
}
