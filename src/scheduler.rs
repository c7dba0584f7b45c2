//! Job supervisor: the process-scoped owner of the two recurring jobs.
//!
//! Two independent timers — the signal pipeline every 5 minutes, the price
//! refresh every 60 seconds. A job always runs to completion before its own
//! next tick (`MissedTickBehavior::Delay`); the two jobs may overlap each
//! other freely, they touch disjoint tables. A job failure is logged and the
//! timer keeps ticking.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Copy, Debug)]
pub struct JobSupervisorCfg {
    pub pipeline_interval: Duration,
    pub price_interval: Duration,
}

impl Default for JobSupervisorCfg {
    fn default() -> Self {
        Self {
            pipeline_interval: Duration::from_secs(5 * 60),
            price_interval: Duration::from_secs(60),
        }
    }
}

/// Owns the spawned job tasks. Dropping without `shutdown()` leaves them
/// running for the life of the runtime, which is what the binary wants;
/// tests call `shutdown()`.
pub struct JobSupervisor {
    pipeline: JoinHandle<()>,
    price: JoinHandle<()>,
}

impl JobSupervisor {
    /// Spawn both timers. The closures are invoked once per tick and must
    /// be re-invocable; errors are caught here and never stop the timer.
    pub fn start<PF, PFut, QF, QFut>(cfg: JobSupervisorCfg, pipeline_job: PF, price_job: QF) -> Self
    where
        PF: FnMut() -> PFut + Send + 'static,
        PFut: Future<Output = Result<()>> + Send,
        QF: FnMut() -> QFut + Send + 'static,
        QFut: Future<Output = Result<()>> + Send,
    {
        tracing::info!(
            pipeline_secs = cfg.pipeline_interval.as_secs(),
            price_secs = cfg.price_interval.as_secs(),
            "job supervisor started"
        );
        Self {
            pipeline: spawn_interval_job("pipeline", cfg.pipeline_interval, pipeline_job),
            price: spawn_interval_job("price_refresh", cfg.price_interval, price_job),
        }
    }

    pub fn shutdown(self) {
        self.pipeline.abort();
        self.price.abort();
        tracing::info!("job supervisor stopped");
    }
}

fn spawn_interval_job<F, Fut>(name: &'static str, period: Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // A long run eats its own next tick instead of stacking runs.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            counter!("scheduler_ticks_total", "job" => name).increment(1);
            if let Err(e) = job().await {
                counter!("scheduler_job_failures_total", "job" => name).increment(1);
                tracing::error!(job = name, error = ?e, "job failed; next tick retries");
            }
        }
    })
}
