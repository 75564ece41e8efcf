//! In-memory render context for exercising the browser pipeline without
//! Chromium.
//!
//! A `ScriptedContext` replays a fixed script: requests to emit on
//! navigation or when a JS snippet runs, load states that time out, and JS
//! snippets that fail. A `ScriptedHandle` stays with the caller so the
//! context's history can be inspected after it has been boxed and closed.

use crate::renderer::{
    LoadState, NavigationResult, ObservedRequest, RenderContext, Renderer, RequestStream,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

/// Observable history of a scripted context.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHandle {
    closed: Arc<AtomicBool>,
    navigations: Arc<Mutex<Vec<(String, LoadState)>>>,
    waited: Arc<Mutex<Vec<LoadState>>>,
}

impl ScriptedHandle {
    /// Whether `close` was called on the context.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every `navigate` call, in order.
    pub fn navigations(&self) -> Vec<(String, LoadState)> {
        self.navigations.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Every `wait_for_load_state` call, in order.
    pub fn waited_states(&self) -> Vec<LoadState> {
        self.waited.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

/// A render context driven by a fixed script.
#[derive(Default)]
pub struct ScriptedContext {
    on_navigate: Vec<ObservedRequest>,
    on_js: Vec<(String, Vec<ObservedRequest>)>,
    js_results: Vec<(String, serde_json::Value)>,
    js_failures: Vec<String>,
    failing_navigations: HashSet<LoadState>,
    failing_load_states: HashSet<LoadState>,
    observers: Mutex<Vec<UnboundedSender<ObservedRequest>>>,
    handle: ScriptedHandle,
    current_url: String,
    relay_delay: Option<Duration>,
    relays: Vec<JoinHandle<()>>,
    failing_observer: bool,
    failing_close: bool,
}

impl ScriptedContext {
    pub fn new() -> Self {
        Self {
            current_url: "about:blank".to_string(),
            ..Default::default()
        }
    }

    /// Requests emitted when navigation starts.
    pub fn with_navigation_requests<I>(mut self, requests: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        self.on_navigate
            .extend(requests.into_iter().map(|(m, u)| request(m, u)));
        self
    }

    /// Requests emitted whenever a script containing `needle` runs.
    pub fn with_js_requests<I>(mut self, needle: &str, requests: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        self.on_js.push((
            needle.to_string(),
            requests.into_iter().map(|(m, u)| request(m, u)).collect(),
        ));
        self
    }

    /// Value returned by scripts containing `needle`. Scripts matching no
    /// needle return `true`.
    pub fn with_js_result(mut self, needle: &str, value: serde_json::Value) -> Self {
        self.js_results.push((needle.to_string(), value));
        self
    }

    /// Scripts containing `needle` raise an error.
    pub fn with_js_failure(mut self, needle: &str) -> Self {
        self.js_failures.push(needle.to_string());
        self
    }

    /// Navigations waiting for `state` time out.
    pub fn failing_navigation(mut self, state: LoadState) -> Self {
        self.failing_navigations.insert(state);
        self
    }

    /// `wait_for_load_state(state)` times out.
    pub fn failing_load_state(mut self, state: LoadState) -> Self {
        self.failing_load_states.insert(state);
        self
    }

    /// Deliver requests through a spawned task that lags by `delay` per
    /// request, the way a browser's event forwarder does.
    pub fn relayed(mut self, delay: Duration) -> Self {
        self.relay_delay = Some(delay);
        self
    }

    /// `observe_requests` raises an error.
    pub fn failing_observer(mut self) -> Self {
        self.failing_observer = true;
        self
    }

    /// `close` tears everything down, then reports an error.
    pub fn failing_close(mut self) -> Self {
        self.failing_close = true;
        self
    }

    pub fn handle(&self) -> ScriptedHandle {
        self.handle.clone()
    }

    pub fn waited_states(&self) -> Vec<LoadState> {
        self.handle.waited_states()
    }

    fn emit(&self, requests: &[ObservedRequest]) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.retain(|tx| requests.iter().all(|r| tx.send(r.clone()).is_ok()));
        }
    }
}

fn request(method: &str, url: &str) -> ObservedRequest {
    ObservedRequest {
        method: method.to_string(),
        url: url.to_string(),
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn observe_requests(&mut self) -> Result<RequestStream> {
        if self.failing_observer {
            bail!("request interception unavailable");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let source = match self.relay_delay {
            Some(delay) => {
                let (source, mut events) = mpsc::unbounded_channel::<ObservedRequest>();
                self.relays.push(tokio::spawn(async move {
                    while let Some(request) = events.recv().await {
                        tokio::time::sleep(delay).await;
                        if tx.send(request).is_err() {
                            break;
                        }
                    }
                }));
                source
            }
            None => tx,
        };
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(source);
        }
        Ok(rx)
    }

    async fn navigate(
        &mut self,
        url: &str,
        state: LoadState,
        timeout_ms: u64,
    ) -> Result<NavigationResult> {
        if let Ok(mut navs) = self.handle.navigations.lock() {
            navs.push((url.to_string(), state));
        }
        self.emit(&self.on_navigate);
        if self.failing_navigations.contains(&state) {
            bail!("navigation timed out after {timeout_ms}ms waiting for {state}");
        }
        self.current_url = url.to_string();
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_state: state,
            load_time_ms: 0,
        })
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout_ms: u64) -> Result<()> {
        if let Ok(mut waited) = self.handle.waited.lock() {
            waited.push(state);
        }
        if self.failing_load_states.contains(&state) {
            bail!("timed out after {timeout_ms}ms waiting for {state}");
        }
        Ok(())
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        if self.js_failures.iter().any(|n| script.contains(n.as_str())) {
            bail!("JS execution failed");
        }
        for (needle, requests) in &self.on_js {
            if script.contains(needle.as_str()) {
                self.emit(requests);
            }
        }
        let value = self
            .js_results
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or(serde_json::Value::Bool(true));
        Ok(value)
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.current_url.clone())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.handle.closed.store(true, Ordering::SeqCst);
        let relays = std::mem::take(&mut self.relays);
        let failing = self.failing_close;
        // Dropping the sources lets each relay flush its backlog and stop
        drop(self);
        for relay in relays {
            let _ = relay.await;
        }
        if failing {
            bail!("target already detached");
        }
        Ok(())
    }
}

/// Hands out one scripted context.
pub struct ScriptedRenderer {
    context: Mutex<Option<ScriptedContext>>,
    active: AtomicUsize,
}

impl ScriptedRenderer {
    pub fn new(context: ScriptedContext) -> Self {
        Self {
            context: Mutex::new(Some(context)),
            active: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let context = self.context.lock().ok().and_then(|mut c| c.take());
        match context {
            Some(ctx) => {
                self.active.fetch_add(1, Ordering::Relaxed);
                Ok(Box::new(ctx))
            }
            None => bail!("scripted renderer has no context left"),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}
