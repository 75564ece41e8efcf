//! Chromium-based renderer using chromiumoxide.

use super::{LoadState, NavigationResult, ObservedRequest, RenderContext, Renderer, RequestStream};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{self, EventRequestWillBeSent};
use chromiumoxide::cdp::browser_protocol::page::EventLifecycleEvent;
use chromiumoxide::page::Page;
use futures::{FutureExt, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Upper bound on a single CDP command, above the longest navigation timeout.
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(240);

/// Poll interval for `document.readyState` checks.
const READY_POLL: Duration = Duration::from_millis(100);

/// Quiet window the network-idle heuristic requires.
const NETWORK_IDLE_WINDOW_MS: u64 = 500;

/// How long a closing context waits for an observer to forward its backlog.
const OBSERVER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. HARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("HARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.cache/route-harvest/chromium/
    if let Some(cache) = dirs::cache_dir() {
        let root = cache.join("route-harvest/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                root.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome"),
            ]
        } else {
            vec![root.join("chrome-linux64/chrome"), root.join("chrome")]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Browser launch options beyond the fixed headless flags.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Override the browser's user agent.
    pub user_agent: Option<String>,
    /// Extra command-line switches passed to Chromium.
    pub extra_args: Vec<String>,
}

impl LaunchOptions {
    /// Desktop Chrome profile that hides the automation flag.
    pub fn desktop() -> Self {
        Self {
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            extra_args: vec!["--disable-blink-features=AutomationControlled".to_string()],
        }
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance with default options.
    pub async fn new() -> Result<Self> {
        Self::launch(&LaunchOptions::default()).await
    }

    /// Launch a headless Chromium instance.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Install Chrome or set HARVEST_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(CDP_REQUEST_TIMEOUT)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if let Some(ua) = &options.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        for arg in &options.extra_args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // The handler must be polled for the browser connection to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        page.execute(network::EnableParams::default())
            .await
            .context("failed to enable network domain")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            observers: Vec::new(),
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.handler_task.abort();
        closed.context("failed to close Chromium")?;
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    observers: Vec<RequestObserver>,
    active_count: Arc<AtomicUsize>,
}

/// Task forwarding `requestWillBeSent` events into a `RequestStream`.
struct RequestObserver {
    task: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

impl RequestObserver {
    /// Ask the task to forward what it already has, then wait for it.
    async fn finish(mut self) {
        let _ = self.stop.send(());
        if tokio::time::timeout(OBSERVER_FLUSH_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            debug!("request observer did not flush in time, aborting");
            self.task.abort();
        }
    }
}

fn observed(event: &EventRequestWillBeSent) -> ObservedRequest {
    ObservedRequest {
        method: event.request.method.clone(),
        url: event.request.url.clone(),
    }
}

/// Resource-timing heuristic: the document is complete and no new
/// resource entries appeared for a quiet window. Entries are counted
/// with a `PerformanceObserver`, which keeps counting after the resource
/// timing buffer is full.
fn network_idle_script(timeout_ms: u64) -> String {
    format!(
        r#"(async () => {{
            const timeoutMs = {timeout_ms};
            const idleMs = {NETWORK_IDLE_WINDOW_MS};
            const interval = 100;
            const start = Date.now();
            let seen = 0;
            let observer = null;
            try {{
                observer = new PerformanceObserver(list => {{ seen += list.getEntries().length; }});
                observer.observe({{ type: 'resource', buffered: true }});
            }} catch (_) {{
                observer = null;
            }}
            const count = () => {{
                if (observer) return seen;
                try {{ return performance.getEntriesByType('resource').length; }} catch (_) {{ return 0; }}
            }};
            try {{
                let last = count();
                let stable = 0;
                while (Date.now() - start < timeoutMs) {{
                    await new Promise(r => setTimeout(r, interval));
                    const cur = count();
                    if (document.readyState === 'complete' && cur === last) {{
                        stable += interval;
                        if (stable >= idleMs) return true;
                    }} else {{
                        stable = 0;
                    }}
                    last = cur;
                }}
                return false;
            }} finally {{
                if (observer) observer.disconnect();
            }}
        }})()"#
    )
}

impl ChromiumContext {
    async fn ready_state(&self) -> Result<String> {
        let state: String = self
            .page
            .evaluate("document.readyState")
            .await
            .context("failed to read document.readyState")?
            .into_value()
            .map_err(|e| anyhow!("failed to convert readyState: {e:?}"))?;
        Ok(state)
    }

    async fn poll_ready_state(&self, state: LoadState) -> Result<()> {
        loop {
            let ready = self.ready_state().await?;
            let reached = match state {
                LoadState::DomContentLoaded => ready != "loading",
                LoadState::Load | LoadState::NetworkIdle => ready == "complete",
            };
            if reached {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    async fn network_idle_heuristic(&self, timeout_ms: u64) -> Result<bool> {
        let script = network_idle_script(timeout_ms);
        let idle: bool = self
            .page
            .evaluate(script)
            .await
            .context("network-idle check failed")?
            .into_value()
            .map_err(|e| anyhow!("failed to convert network-idle check: {e:?}"))?;
        Ok(idle)
    }
}

fn lifecycle_name(state: LoadState) -> &'static str {
    match state {
        LoadState::DomContentLoaded => "DOMContentLoaded",
        LoadState::Load => "load",
        LoadState::NetworkIdle => "networkIdle",
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn observe_requests(&mut self) -> Result<RequestStream> {
        let mut events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to subscribe to request events")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = events.next() => match event {
                        Some(event) => {
                            if tx.send(observed(&event)).is_err() {
                                return;
                            }
                        }
                        None => return,
                    },
                    _ = &mut stopped => break,
                }
            }
            // Events the handler already dispatched still count
            while let Some(Some(event)) = events.next().now_or_never() {
                if tx.send(observed(&event)).is_err() {
                    return;
                }
            }
        });
        self.observers.push(RequestObserver { task, stop });
        Ok(rx)
    }

    async fn navigate(
        &mut self,
        url: &str,
        state: LoadState,
        timeout_ms: u64,
    ) -> Result<NavigationResult> {
        let start = Instant::now();
        let wanted = lifecycle_name(state);

        // Subscribe before navigating so no lifecycle event is missed
        let mut lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .context("failed to subscribe to lifecycle events")?;
        let main_frame = self.page.mainframe().await.ok().flatten();

        let page = self.page.clone();
        let target = url.to_string();
        let mut nav = tokio::spawn(async move { page.goto(target).await.map(|_| ()) });

        let waited = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            let mut nav_done = false;
            loop {
                tokio::select! {
                    res = &mut nav, if !nav_done => {
                        nav_done = true;
                        match res {
                            Ok(Ok(())) if state != LoadState::NetworkIdle => return Ok(()),
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => bail!("navigation failed: {e}"),
                            Err(e) => bail!("navigation task failed: {e}"),
                        }
                    }
                    event = lifecycle.next() => match event {
                        Some(ev) => {
                            let in_main = main_frame.as_ref().map_or(true, |f| *f == ev.frame_id);
                            if in_main && ev.name == wanted {
                                return Ok(());
                            }
                        }
                        None => bail!("lifecycle event stream closed"),
                    },
                }
            }
        })
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match waited {
            Ok(Ok(())) => {
                debug!(url, %state, load_time_ms, "navigation reached load state");
                let final_url = self.get_url().await.unwrap_or_else(|_| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_state: state,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => {
                nav.abort();
                Err(e)
            }
            Err(_) => {
                nav.abort();
                bail!("navigation timed out after {timeout_ms}ms waiting for {state}")
            }
        }
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout_ms: u64) -> Result<()> {
        let start = Instant::now();
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.poll_ready_state(state))
            .await
            .map_err(|_| anyhow!("timed out after {timeout_ms}ms waiting for {state}"))??;

        if state == LoadState::NetworkIdle {
            let remaining = timeout_ms.saturating_sub(start.elapsed().as_millis() as u64);
            if !self.network_idle_heuristic(remaining).await? {
                bail!("timed out after {timeout_ms}ms waiting for {state}");
            }
        }
        Ok(())
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let page = self.page.clone();
        let observers = std::mem::take(&mut self.observers);
        drop(self);

        // No new events once the page is gone; then let the observers flush
        // and drop their senders so the streams end.
        let closed = page.close().await.context("failed to close page");
        for observer in observers {
            observer.finish().await;
        }
        closed?;
        Ok(())
    }
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        for observer in self.observers.drain(..) {
            observer.task.abort();
        }
        self.active_count.fetch_sub(1, Ordering::Relaxed);
    }
}
