use commerce_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;

/// Starts the reclamation sweep worker: on every tick it fails expired payment intents
/// and cancels zombie orders. Do not await the returned JoinHandle, it runs indefinitely.
///
/// Both sweeps re-validate each row inside its own transaction and tolerate per-row
/// failures, so the worker is safe to run alongside live checkouts and even alongside a
/// second instance of itself.
pub fn start_sweep_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    config: &ServerConfig,
) -> JoinHandle<()> {
    let interval = std::time::Duration::from_secs(config.sweep_interval_secs);
    let api = OrderFlowApi::new(db, producers)
        .with_intent_ttl(config.intent_ttl)
        .with_zombie_threshold(config.zombie_threshold);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Reclamation sweep worker started");
        loop {
            timer.tick().await;
            match api.process_expired_payments().await {
                Ok(result) if result.processed + result.failed > 0 => {
                    info!("🕰️ Expired payment sweep: {} failed intent(s), {} error(s)", result.processed, result.failed);
                },
                Ok(_) => debug!("🕰️ Expired payment sweep: nothing to do"),
                Err(e) => error!("🕰️ Expired payment sweep failed: {e}"),
            }
            match api.process_zombie_orders().await {
                Ok(result) if result.processed + result.failed > 0 => {
                    info!("🕰️ Zombie order sweep: {} cancelled, {} error(s)", result.processed, result.failed);
                },
                Ok(_) => debug!("🕰️ Zombie order sweep: nothing to do"),
                Err(e) => error!("🕰️ Zombie order sweep failed: {e}"),
            }
        }
    })
}
