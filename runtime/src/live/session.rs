//! A single-page browser session.
//!
//! The session owns one render context and, optionally, a request observer
//! registered before the first navigation. Loading follows a
//! `NavigationPlan`: a primary load state, at most one weaker fallback, then
//! the plan's interaction steps.

use super::interact::{run_interactions, Interaction, InteractionReport};
use crate::renderer::{LoadState, ObservedRequest, RenderContext, Renderer, RequestStream};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on waiting for a closed context's observer to flush.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One attempt to reach a load state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadAttempt {
    pub state: LoadState,
    pub timeout_ms: u64,
}

impl LoadAttempt {
    pub fn new(state: LoadState, timeout_ms: u64) -> Self {
        Self { state, timeout_ms }
    }
}

/// How to load a page and what to do once it is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationPlan {
    pub primary: LoadAttempt,
    /// Re-navigation waiting for a weaker state, tried once if `primary` fails.
    pub fallback: Option<LoadAttempt>,
    /// Steps run after a successful load.
    pub interactions: Vec<Interaction>,
}

impl NavigationPlan {
    pub fn new(primary: LoadAttempt) -> Self {
        Self {
            primary,
            fallback: None,
            interactions: Vec::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: LoadAttempt) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_interactions(mut self, steps: Vec<Interaction>) -> Self {
        self.interactions = steps;
        self
    }

    /// Override the primary navigation timeout.
    pub fn with_primary_timeout(mut self, timeout_ms: u64) -> Self {
        self.primary.timeout_ms = timeout_ms;
        self
    }

    /// Network-idle within two minutes, else DOM-content-loaded within one.
    /// No interaction.
    pub fn api_routes() -> Self {
        Self::new(LoadAttempt::new(LoadState::NetworkIdle, 120_000))
            .with_fallback(LoadAttempt::new(LoadState::DomContentLoaded, 60_000))
    }

    /// Load within a minute, wheel-scroll, click up to `link_clicks`
    /// root-relative links, then let late requests arrive.
    pub fn rsc_routes(link_clicks: usize) -> Self {
        Self::new(LoadAttempt::new(LoadState::Load, 60_000)).with_interactions(vec![
            Interaction::MouseWheel {
                times: 3,
                delta_y: 1500,
                pause_ms: 3_000,
            },
            Interaction::ClickLinks {
                selector: "a[href^='/']".to_string(),
                limit: link_clicks,
                timeout_ms: 10_000,
                pause_ms: 4_000,
            },
            Interaction::Pause { ms: 5_000 },
        ])
    }

    /// Network-idle within two minutes, else DOM-content-loaded within
    /// three; then get past an interstitial "Continue" button, settle, and
    /// scroll through the page so lazy links render.
    pub fn internal_routes() -> Self {
        Self::new(LoadAttempt::new(LoadState::NetworkIdle, 120_000))
            .with_fallback(LoadAttempt::new(LoadState::DomContentLoaded, 180_000))
            .with_interactions(vec![
                Interaction::ClickButton {
                    label: "Continue".to_string(),
                    timeout_ms: 3_000,
                    pause_ms: 1_000,
                },
                Interaction::Settle {
                    state: LoadState::NetworkIdle,
                    timeout_ms: 10_000,
                    fallback: Some((LoadState::Load, 5_000)),
                },
                Interaction::ScrollByFraction {
                    times: 3,
                    fraction: 3,
                    pause_ms: 1_000,
                },
            ])
    }
}

/// How a page load ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// The primary load state was reached.
    Loaded { state: LoadState },
    /// Only the fallback load state was reached.
    Degraded { state: LoadState, reason: String },
    /// Neither was reached, or no browser context could be opened.
    Failed { reason: String },
}

impl NavigationOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, NavigationOutcome::Failed { .. })
    }
}

/// A browser tab for one harvest.
pub struct PageSession {
    context: Box<dyn RenderContext>,
    requests: Option<RequestStream>,
}

impl PageSession {
    /// Open a tab. With `observe`, a request observer is registered before
    /// anything is loaded.
    pub async fn open(renderer: &dyn Renderer, observe: bool) -> Result<Self> {
        let mut context = renderer
            .new_context()
            .await
            .context("failed to open browser context")?;

        let requests = if observe {
            match context.observe_requests().await {
                Ok(stream) => Some(stream),
                Err(e) => {
                    if let Err(close_err) = context.close().await {
                        warn!("failed to close browser context: {close_err:#}");
                    }
                    return Err(e.context("failed to register request observer"));
                }
            }
        } else {
            None
        };

        Ok(Self { context, requests })
    }

    /// Navigate per `plan`, then run its interactions if the page loaded.
    pub async fn load(&mut self, url: &str, plan: &NavigationPlan) -> NavigationOutcome {
        info!("opening {url}");
        let primary = plan.primary;
        let outcome = match self
            .context
            .navigate(url, primary.state, primary.timeout_ms)
            .await
        {
            Ok(nav) => {
                info!(
                    final_url = nav.final_url.as_str(),
                    load_time_ms = nav.load_time_ms,
                    "page loaded ({})",
                    primary.state
                );
                NavigationOutcome::Loaded {
                    state: primary.state,
                }
            }
            Err(e) => match plan.fallback {
                Some(fallback) => {
                    warn!(
                        "'{}' never reached ({e:#}), retrying with '{}'",
                        primary.state, fallback.state
                    );
                    match self
                        .context
                        .navigate(url, fallback.state, fallback.timeout_ms)
                        .await
                    {
                        Ok(_) => NavigationOutcome::Degraded {
                            state: fallback.state,
                            reason: format!("{e:#}"),
                        },
                        Err(e) => NavigationOutcome::Failed {
                            reason: format!("{e:#}"),
                        },
                    }
                }
                None => NavigationOutcome::Failed {
                    reason: format!("{e:#}"),
                },
            },
        };

        if let NavigationOutcome::Failed { reason } = &outcome {
            warn!("failed to open {url}: {reason}");
            return outcome;
        }

        if !plan.interactions.is_empty() {
            let InteractionReport {
                attempted,
                succeeded,
            } = run_interactions(self.context.as_mut(), &plan.interactions).await;
            info!(attempted, succeeded, "interaction steps finished");
        }

        outcome
    }

    /// The underlying context.
    pub fn context(&self) -> &dyn RenderContext {
        self.context.as_ref()
    }

    /// Tear down the context, then collect every request its observer
    /// delivered. Closing first stops the event source and lets the
    /// forwarders flush, so the stream ends once everything is received.
    /// Errors are logged.
    pub async fn close(self) -> Vec<ObservedRequest> {
        if let Err(e) = self.context.close().await {
            warn!("failed to close browser context: {e:#}");
        }

        let mut drained = Vec::new();
        if let Some(mut stream) = self.requests {
            let collect = async {
                while let Some(request) = stream.recv().await {
                    drained.push(request);
                }
            };
            if tokio::time::timeout(DRAIN_TIMEOUT, collect).await.is_err() {
                warn!("request observer did not finish within {DRAIN_TIMEOUT:?}");
            }
        }
        drained
    }
}
