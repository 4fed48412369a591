pub mod catalog;
pub mod config;
pub mod error;
pub mod grader;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod ranker;
pub mod routes;
pub mod state;
pub mod timer;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub async fn build_state(config: config::Config) -> anyhow::Result<state::AppState> {
    state::AppState::load(config, Arc::new(timer::SystemClock::default())).await
}

/// Writes the local snapshot whenever the state asks for it, off the request
/// path.
pub fn spawn_persister(state: state::AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            state.persist_requested().await;
            if let Err(err) = state.persist_core_data().await {
                tracing::warn!("failed to persist local state: {}", err);
            }
        }
    })
}

/// Periodically submits expired attempts and drops abandoned ones.
pub fn spawn_sweeper(state: state::AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = state.sweep_attempts().await;
            if report != state::SweepReport::default() {
                tracing::debug!(
                    submitted = report.submitted,
                    discarded = report.discarded,
                    "attempt sweep"
                );
            }
        }
    })
}
