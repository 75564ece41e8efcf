//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). A context can
//! stream the page's outgoing requests to an observer, which is how the
//! network-observation harvest modes see API and RSC traffic.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Page lifecycle point a navigation waits for before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    /// `DOMContentLoaded`: the document is parsed, subresources may be pending.
    DomContentLoaded,
    /// The `load` event: the document and its subresources have loaded.
    Load,
    /// `load` plus a quiet window with no new network activity.
    NetworkIdle,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DomContentLoaded => write!(f, "domcontentloaded"),
            Self::Load => write!(f, "load"),
            Self::NetworkIdle => write!(f, "networkidle"),
        }
    }
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Load state that was reached.
    pub load_state: LoadState,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// An outgoing request issued by a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRequest {
    /// HTTP method as reported by the browser.
    pub method: String,
    /// Absolute request URL.
    pub url: String,
}

/// Receiving end of a request observer.
///
/// The sending half lives inside the render context and is dropped when the
/// context closes, so draining after close always terminates.
pub type RequestStream = mpsc::UnboundedReceiver<ObservedRequest>;

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Register a request observer. Requests issued after this call are
    /// delivered on the returned stream until the context is closed.
    async fn observe_requests(&mut self) -> Result<RequestStream>;
    /// Navigate to a URL and wait for `state`, failing after `timeout_ms`.
    async fn navigate(
        &mut self,
        url: &str,
        state: LoadState,
        timeout_ms: u64,
    ) -> Result<NavigationResult>;
    /// Wait for the current document to reach `state`.
    async fn wait_for_load_state(&mut self, state: LoadState, timeout_ms: u64) -> Result<()>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Close this context. Request streams deliver what was already observed,
    /// then end.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// Static harvest modes work without a browser; browser modes see a
/// navigation failure and degrade to an empty result.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("Browser not available, HTTP-only mode"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}
