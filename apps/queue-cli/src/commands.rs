use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use queue_cell::{QueueMonitor, StatisticsAggregator, SupabaseQueueStore, SystemClock, WaitEstimator};
use shared_config::AppConfig;

pub async fn estimate(
    store: Arc<SupabaseQueueStore>,
    config: &AppConfig,
    date: NaiveDate,
    time: NaiveTime,
    service: Option<Uuid>,
) -> Result<()> {
    let estimator = WaitEstimator::new(store.clone(), store, config.queue.clone());
    let outcome = estimator.estimate(date, time, service).await;

    if outcome.is_degraded() {
        warn!("Estimate used fallbacks: {:?}", outcome.fallback_reasons());
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub async fn recompute(
    store: Arc<SupabaseQueueStore>,
    config: &AppConfig,
    date: Option<NaiveDate>,
    service: Option<Uuid>,
) -> Result<()> {
    let aggregator = StatisticsAggregator::new(store.clone(), store, &config.queue);
    let report = match (date, service) {
        (None, None) => aggregator.recompute_today().await,
        (date, service) => {
            let date = date.unwrap_or_else(|| aggregator.today());
            aggregator.recompute(date, service).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn status(store: Arc<SupabaseQueueStore>, date: Option<NaiveDate>) -> Result<()> {
    let monitor = QueueMonitor::new(store, Arc::new(SystemClock));
    let report = monitor.current_queue_status(date).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn tick_period(interval_minutes: u64) -> Duration {
    Duration::from_secs(interval_minutes.max(1).saturating_mul(60))
}

pub async fn daily(
    store: Arc<SupabaseQueueStore>,
    config: &AppConfig,
    interval_minutes: u64,
) -> Result<()> {
    let aggregator = StatisticsAggregator::new(store.clone(), store, &config.queue);
    let mut ticker = interval(tick_period(interval_minutes));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Recomputing queue statistics every {} minutes", interval_minutes);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping statistics job");
                break;
            }
            _ = ticker.tick() => {
                let report = aggregator.recompute_today().await;
                if !report.is_clean() {
                    error!(
                        "Statistics run for {} finished with {} failures",
                        report.appointment_date,
                        report.failures.len()
                    );
                }
            }
        }
    }

    Ok(())
}
