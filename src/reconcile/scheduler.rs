use log::{debug, error, info, warn};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::{ReconcileReport, ReconciliationEngine};
use crate::db::Repository;
use crate::solana::ChainRpc;
use crate::valuation::PriceSource;

/// Why a pass was requested outside the regular interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    OnDemand,
    /// A transaction that may have created a pool just confirmed
    Submitted(Signature),
}

/// Cloneable way to request a pass
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    sender: mpsc::Sender<Trigger>,
}

impl TriggerHandle {
    /// Queue a pass. When passes are already queued the request is merged into them.
    pub fn notify(&self, trigger: Trigger) {
        if let Err(e) = self.sender.try_send(trigger) {
            debug!("Reconcile trigger not queued: {}", e);
        }
    }
}

pub type LatestReport = Option<Arc<ReconcileReport>>;

/// Runs reconciliation passes for one wallet on a timer, on demand, or after
/// submissions. Passes never overlap; the newest report is published on a watch channel.
pub struct ReconcileScheduler {
    triggers: TriggerHandle,
    reports: watch::Receiver<LatestReport>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcileScheduler {
    pub fn spawn<R, S>(
        engine: Arc<ReconciliationEngine<R, S>>,
        prices: Option<Arc<dyn PriceSource>>,
        wallet: Pubkey,
        interval: Duration,
    ) -> Self
    where
        R: ChainRpc + 'static,
        S: Repository + 'static,
    {
        let (trigger_tx, mut trigger_rx) = mpsc::channel(8);
        let (report_tx, report_rx) = watch::channel(None);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Reconciliation scheduler started for {}", wallet);
            loop {
                let reason = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => "interval".to_string(),
                    Some(trigger) = trigger_rx.recv() => match trigger {
                        Trigger::OnDemand => "on demand".to_string(),
                        Trigger::Submitted(signature) => format!("submission {}", signature),
                    },
                };

                debug!("Reconciliation pass ({})", reason);
                let price = match &prices {
                    Some(source) => match source.current_price().await {
                        Ok(reading) => Some(reading),
                        Err(e) => {
                            warn!("Valuing pools without a price: {}", e);
                            None
                        }
                    },
                    None => None,
                };

                match engine.reconcile(&wallet, price.as_ref()).await {
                    Ok(report) => {
                        report_tx.send_replace(Some(Arc::new(report)));
                    }
                    Err(e) => error!("Reconciliation pass failed: {}", e),
                }
            }
            info!("Reconciliation scheduler stopped for {}", wallet);
        });

        Self {
            triggers: TriggerHandle { sender: trigger_tx },
            reports: report_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    pub fn handle(&self) -> TriggerHandle {
        self.triggers.clone()
    }

    pub fn trigger(&self) {
        self.triggers.notify(Trigger::OnDemand);
    }

    /// Subscribe to reports; the current value is `None` until the first pass finishes
    pub fn reports(&self) -> watch::Receiver<LatestReport> {
        self.reports.clone()
    }

    /// Stop after the pass in progress, if any, and wait for the loop to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Reconciliation task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_test_db, Database};
    use crate::reconcile::engine::fixtures::{candidate, creation_effects, live_pool};
    use crate::solana::mock::MockRpc;
    use crate::valuation::price_cache::ScriptedQuotes;
    use crate::valuation::PriceCache;

    async fn next_report(rx: &mut watch::Receiver<LatestReport>) -> Arc<ReconcileReport> {
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("report in time")
            .expect("scheduler alive");
        rx.borrow().clone().expect("report present")
    }

    #[tokio::test]
    async fn runs_immediately_then_on_trigger() {
        let rpc = Arc::new(MockRpc::new());
        let db = Arc::new(init_test_db().await.unwrap());
        let wallet = Pubkey::new_unique();
        let engine = Arc::new(ReconciliationEngine::new(rpc.clone(), db.clone()));

        let scheduler = ReconcileScheduler::spawn(engine, None, wallet, Duration::from_secs(3600));
        let mut reports = scheduler.reports();

        let first = next_report(&mut reports).await;
        assert!(first.views.is_empty());

        let token = Pubkey::new_unique();
        let pool = live_pool(token, spl_token::native_mint::id());
        db.append(&wallet.to_string(), &candidate("fresh", token, 0))
            .await
            .unwrap();
        rpc.add_transaction(creation_effects("fresh", &pool.state.pool_id));
        rpc.add_pool(pool.clone());
        rpc.set_token_balance(wallet, pool.state.lp_mint, 7);

        scheduler.handle().notify(Trigger::Submitted(Signature::default()));
        let second = next_report(&mut reports).await;
        assert_eq!(second.views.len(), 1);
        assert_eq!(second.views[0].state.caller_lp_balance, 7);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn price_failure_still_publishes_report() {
        let rpc = Arc::new(MockRpc::new());
        let db = Arc::new(init_test_db().await.unwrap());
        let engine = Arc::new(ReconciliationEngine::new(rpc, db.clone()));
        let prices: Arc<dyn PriceSource> = Arc::new(PriceCache::<ScriptedQuotes, Database>::new(
            ScriptedQuotes::new(vec![]),
            db,
            "SOL",
            chrono::Duration::minutes(30),
        ));

        let scheduler =
            ReconcileScheduler::spawn(engine, Some(prices), Pubkey::new_unique(), Duration::from_secs(3600));
        let mut reports = scheduler.reports();

        let report = next_report(&mut reports).await;
        assert!(report.price.is_none());

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let rpc = Arc::new(MockRpc::new());
        let db = Arc::new(init_test_db().await.unwrap());
        let engine = Arc::new(ReconciliationEngine::new(rpc, db));

        let scheduler = ReconcileScheduler::spawn(engine, None, Pubkey::new_unique(), Duration::from_secs(3600));
        let handle = scheduler.handle();
        tokio::time::timeout(Duration::from_secs(5), scheduler.shutdown())
            .await
            .expect("shutdown in time");

        // Notifying a stopped scheduler is harmless
        handle.notify(Trigger::OnDemand);
    }
}
