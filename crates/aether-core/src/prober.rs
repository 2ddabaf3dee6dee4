//! Keeps every agent's status in line with reality.
//!
//! Each cycle checks all registered agents concurrently, bounded by
//! `max_in_flight`, with a per-check timeout. Any HTTP response at all
//! (even a 404 or 500) counts as `READY`; connection failures and timeouts
//! count as `UNREACHABLE`. Results go through `AgentRegistry::set_status`,
//! so only real transitions reach observers.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ProberConfig;
use crate::error::ServerError;
use crate::models::agent::{Agent, AgentStatus};
use crate::registry::AgentRegistry;

/// Floor for the cycle interval; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Counts from one probe cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSummary {
    pub checked: usize,
    pub ready: usize,
    pub unreachable: usize,
    /// Agents whose stored status changed in this cycle.
    pub changed: usize,
}

#[derive(Clone)]
pub struct LivenessProber {
    registry: AgentRegistry,
    client: reqwest::Client,
    config: ProberConfig,
}

impl LivenessProber {
    pub fn new(registry: AgentRegistry, config: ProberConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            registry,
            client,
            config,
        }
    }

    /// Check one agent's base endpoint. Never fails; an error is a verdict.
    pub async fn probe(&self, agent: &Agent) -> AgentStatus {
        match self
            .client
            .get(&agent.endpoint)
            .timeout(self.config.timeout)
            .send()
            .await
        {
            Ok(response) => {
                tracing::debug!(
                    "[Prober] {} answered HTTP {}",
                    agent.slug,
                    response.status().as_u16()
                );
                AgentStatus::Ready
            }
            Err(e) => {
                tracing::debug!("[Prober] {} unreachable: {}", agent.slug, e);
                AgentStatus::Unreachable
            }
        }
    }

    /// Probe every registered agent once.
    ///
    /// A slow agent holds one slot for at most `timeout`; it never delays
    /// the verdict for the others.
    pub async fn run_cycle(&self) -> Result<ProbeSummary, ServerError> {
        let agents = self.registry.list().await?;
        let limit = self.config.max_in_flight.max(1);

        let verdicts: Vec<(AgentStatus, bool)> = stream::iter(agents)
            .map(|agent| async move {
                let status = self.probe(&agent).await;
                let changed = match self.registry.set_status(&agent.id, status).await {
                    Ok(changed) => changed,
                    // Removed while the check was in flight.
                    Err(ServerError::NotFound(_)) => false,
                    Err(e) => {
                        tracing::warn!("[Prober] Failed to record status for {}: {}", agent.slug, e);
                        false
                    }
                };
                (status, changed)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut summary = ProbeSummary {
            checked: verdicts.len(),
            ..Default::default()
        };
        for (status, changed) in verdicts {
            match status {
                AgentStatus::Ready => summary.ready += 1,
                _ => summary.unreachable += 1,
            }
            if changed {
                summary.changed += 1;
            }
        }
        Ok(summary)
    }

    /// Run probe cycles forever on the configured interval. A cycle that
    /// overruns the interval delays the next one instead of stacking.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let interval = if self.config.interval < MIN_INTERVAL {
                tracing::warn!(
                    "[Prober] Interval {:?} is too short, using {:?}",
                    self.config.interval,
                    MIN_INTERVAL
                );
                MIN_INTERVAL
            } else {
                self.config.interval
            };
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                "[Prober] Started (interval {:?}, timeout {:?}, max {} in flight)",
                interval,
                self.config.timeout,
                self.config.max_in_flight
            );

            loop {
                ticker.tick().await;
                match self.run_cycle().await {
                    Ok(summary) if summary.changed > 0 => tracing::info!(
                        "[Prober] {} checked, {} ready, {} unreachable, {} changed",
                        summary.checked,
                        summary.ready,
                        summary.unreachable,
                        summary.changed
                    ),
                    Ok(_) => {}
                    Err(e) => tracing::error!("[Prober] Cycle failed: {}", e),
                }
            }
        })
    }
}
