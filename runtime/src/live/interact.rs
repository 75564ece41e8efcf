//! Best-effort page interactions that coax lazy content into loading.
//!
//! Every step is independent: a missing element, a script error, or a
//! per-step timeout is logged and the run moves on to the next step.

use crate::renderer::{LoadState, RenderContext};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on a single scripted step that has no timeout of its own.
const STEP_TIMEOUT_MS: u64 = 10_000;

/// One interaction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Interaction {
    /// Sleep.
    Pause { ms: u64 },
    /// Scroll `times` times by `1/fraction` of the body height.
    ScrollByFraction { times: u32, fraction: u32, pause_ms: u64 },
    /// Dispatch `times` mouse-wheel scrolls of `delta_y` pixels.
    MouseWheel { times: u32, delta_y: i64, pause_ms: u64 },
    /// Click the first button whose accessible name contains `label`
    /// (case-insensitive), waiting up to `timeout_ms` for it to appear.
    ClickButton { label: String, timeout_ms: u64, pause_ms: u64 },
    /// Click the first `limit` elements matching `selector`, in DOM order.
    ClickLinks { selector: String, limit: usize, timeout_ms: u64, pause_ms: u64 },
    /// Wait for a load state, falling back to a weaker one.
    Settle {
        state: LoadState,
        timeout_ms: u64,
        fallback: Option<(LoadState, u64)>,
    },
}

/// Counters for an interaction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionReport {
    pub attempted: u32,
    pub succeeded: u32,
}

/// Run every step in order. Never fails.
pub async fn run_interactions(
    context: &mut dyn RenderContext,
    steps: &[Interaction],
) -> InteractionReport {
    let mut report = InteractionReport::default();
    for step in steps {
        match step {
            Interaction::Pause { ms } => sleep(*ms).await,
            Interaction::ScrollByFraction {
                times,
                fraction,
                pause_ms,
            } => {
                let script = format!(
                    "(() => {{ window.scrollBy(0, document.body.scrollHeight / {}); return true; }})()",
                    (*fraction).max(1)
                );
                for _ in 0..*times {
                    record(&mut report, "scroll", run_script(context, &script, STEP_TIMEOUT_MS).await);
                    sleep(*pause_ms).await;
                }
            }
            Interaction::MouseWheel {
                times,
                delta_y,
                pause_ms,
            } => {
                let script = wheel_script(*delta_y);
                for _ in 0..*times {
                    record(&mut report, "wheel", run_script(context, &script, STEP_TIMEOUT_MS).await);
                    sleep(*pause_ms).await;
                }
            }
            Interaction::ClickButton {
                label,
                timeout_ms,
                pause_ms,
            } => {
                let script = click_button_script(label, *timeout_ms);
                let outcome = run_script(context, &script, timeout_ms + 1_000).await;
                if matches!(outcome, Ok(true)) {
                    info!(label = label.as_str(), "clicked button");
                    sleep(*pause_ms).await;
                } else {
                    info!(label = label.as_str(), "no button found or already bypassed");
                }
                record(&mut report, "click button", outcome);
            }
            Interaction::ClickLinks {
                selector,
                limit,
                timeout_ms,
                pause_ms,
            } => {
                for index in 0..*limit {
                    let script = click_nth_script(selector, index);
                    let outcome = run_script(context, &script, *timeout_ms).await;
                    if matches!(outcome, Ok(true)) {
                        sleep(*pause_ms).await;
                    }
                    record(&mut report, "click link", outcome);
                }
            }
            Interaction::Settle {
                state,
                timeout_ms,
                fallback,
            } => {
                report.attempted += 1;
                match context.wait_for_load_state(*state, *timeout_ms).await {
                    Ok(()) => report.succeeded += 1,
                    Err(e) => {
                        info!("'{state}' never reached ({e:#}), continuing anyway");
                        if let Some((weaker, weaker_ms)) = fallback {
                            match context.wait_for_load_state(*weaker, *weaker_ms).await {
                                Ok(()) => report.succeeded += 1,
                                Err(e) => debug!("'{weaker}' not reached either: {e:#}"),
                            }
                        }
                    }
                }
            }
        }
    }
    report
}

fn record(report: &mut InteractionReport, what: &str, outcome: Result<bool>) {
    report.attempted += 1;
    match outcome {
        Ok(true) => report.succeeded += 1,
        Ok(false) => debug!("{what}: nothing to act on, skipped"),
        Err(e) => debug!("{what} failed, skipped: {e:#}"),
    }
}

/// Run a script that reports success as a boolean, bounded by `timeout_ms`.
async fn run_script(context: &dyn RenderContext, script: &str, timeout_ms: u64) -> Result<bool> {
    let value = tokio::time::timeout(Duration::from_millis(timeout_ms), context.execute_js(script))
        .await
        .map_err(|_| anyhow!("timed out after {timeout_ms}ms"))??;
    Ok(value
        .as_bool()
        .or_else(|| value.get("success").and_then(|v| v.as_bool()))
        .unwrap_or(false))
}

async fn sleep(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn wheel_script(delta_y: i64) -> String {
    format!(
        r#"(() => {{
            const target = document.scrollingElement || document.body;
            target.dispatchEvent(new WheelEvent('wheel', {{ deltaY: {delta_y}, bubbles: true }}));
            window.scrollBy(0, {delta_y});
            return true;
        }})()"#
    )
}

fn click_button_script(label: &str, timeout_ms: u64) -> String {
    format!(
        r#"(async () => {{
            const wanted = '{}'.toLowerCase();
            const deadline = Date.now() + {timeout_ms};
            const find = () => [...document.querySelectorAll('button, [role="button"], input[type="button"], input[type="submit"]')]
                .find(b => ((b.getAttribute('aria-label') || b.textContent || b.value || '').trim().toLowerCase()).includes(wanted));
            while (Date.now() < deadline) {{
                const btn = find();
                if (btn) {{ btn.click(); return {{ success: true }}; }}
                await new Promise(r => setTimeout(r, 100));
            }}
            return {{ success: false }};
        }})()"#,
        sanitize_js_string(label)
    )
}

fn click_nth_script(selector: &str, index: usize) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelectorAll('{}')[{index}];
            if (!el) return {{ success: false }};
            el.click();
            return {{ success: true, href: el.getAttribute('href') }};
        }})()"#,
        sanitize_js_string(selector)
    )
}

/// Escape a value for a single-quoted JS string literal.
fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::testing::ScriptedContext;

    #[test]
    fn test_sanitize_js_string() {
        assert_eq!(sanitize_js_string("a'b"), "a\\'b");
        assert_eq!(sanitize_js_string("</script>"), "\\x3c/script\\x3e");
        assert_eq!(sanitize_js_string("a[href^='/']"), "a[href^=\\'/\\']");
    }

    #[test]
    fn test_click_script_embeds_index_and_selector() {
        let script = click_nth_script("a[href^='/']", 3);
        assert!(script.contains("querySelectorAll('a[href^=\\'/\\']')[3]"));
    }

    #[tokio::test]
    async fn test_failed_steps_do_not_abort_the_run() {
        let mut ctx = ScriptedContext::new()
            .with_js_result("scrollBy", serde_json::json!(true))
            .with_js_failure("querySelectorAll('a");
        let steps = vec![
            Interaction::ClickLinks {
                selector: "a[href^='/']".to_string(),
                limit: 2,
                timeout_ms: 1_000,
                pause_ms: 0,
            },
            Interaction::ScrollByFraction {
                times: 3,
                fraction: 3,
                pause_ms: 0,
            },
        ];
        let report = run_interactions(&mut ctx, &steps).await;
        assert_eq!(report.attempted, 5);
        assert_eq!(report.succeeded, 3);
    }

    #[tokio::test]
    async fn test_missing_button_is_skipped() {
        let mut ctx = ScriptedContext::new().with_js_result("aria-label", serde_json::json!({ "success": false }));
        let steps = vec![Interaction::ClickButton {
            label: "Continue".to_string(),
            timeout_ms: 100,
            pause_ms: 0,
        }];
        let report = run_interactions(&mut ctx, &steps).await;
        assert_eq!(report, InteractionReport { attempted: 1, succeeded: 0 });
    }

    #[tokio::test]
    async fn test_settle_falls_back_to_weaker_state() {
        let mut ctx = ScriptedContext::new().failing_load_state(LoadState::NetworkIdle);
        let steps = vec![Interaction::Settle {
            state: LoadState::NetworkIdle,
            timeout_ms: 100,
            fallback: Some((LoadState::Load, 100)),
        }];
        let report = run_interactions(&mut ctx, &steps).await;
        assert_eq!(report, InteractionReport { attempted: 1, succeeded: 1 });
        assert_eq!(ctx.waited_states(), vec![LoadState::NetworkIdle, LoadState::Load]);
    }
}
