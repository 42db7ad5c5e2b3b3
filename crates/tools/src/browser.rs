//! Headless browser automation tool.
//!
//! A single `headless_chrome::Browser` instance is shared across calls;
//! each caller-supplied `sessionId` gets its own tab, created lazily and
//! kept around for reuse across subsequent calls. All `headless_chrome`
//! calls are blocking, so every action runs inside `spawn_blocking`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use gw_domain::error::{Error, Result};
use gw_domain::tool::{Attachment, ToolDefinition, ToolResult};

use crate::tool::{ApprovalDecision, Tool, ToolContext};

const EXTRACT_MAX_CHARS: usize = 10_000;
const NAVIGATE_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct BrowserInput {
    actions: Vec<Action>,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Action {
    Navigate { url: String },
    Click { selector: String },
    Type { selector: String, text: String },
    Screenshot {},
    Extract {
        #[serde(default)]
        selector: Option<String>,
    },
}

fn describe_action(action: &Action) -> String {
    match action {
        Action::Navigate { url } => format!("navigate to {url}"),
        Action::Click { selector } => format!("click {selector}"),
        Action::Type { selector, .. } => format!("type into {selector}"),
        Action::Screenshot {} => "capture screenshot".to_string(),
        Action::Extract { selector } => match selector {
            Some(s) => format!("extract text from {s}"),
            None => "extract page text".to_string(),
        },
    }
}

fn is_blocked_scheme(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    !(lower.starts_with("http://") || lower.starts_with("https://"))
}

/// Lazily-started shared browser plus per-session tab cache.
#[derive(Default)]
struct BrowserSessions {
    browser: Mutex<Option<Arc<Browser>>>,
    tabs: Mutex<HashMap<String, Arc<Tab>>>,
}

impl BrowserSessions {
    fn browser(&self) -> std::result::Result<Arc<Browser>, String> {
        let mut guard = self.browser.lock();
        if let Some(b) = guard.as_ref() {
            return Ok(b.clone());
        }
        let launch_options = LaunchOptionsBuilder::default()
            .headless(true)
            .build()
            .map_err(|e| e.to_string())?;
        let browser = Browser::new(launch_options).map_err(|e| e.to_string())?;
        let browser = Arc::new(browser);
        *guard = Some(browser.clone());
        Ok(browser)
    }

    fn tab(&self, session_id: &str) -> std::result::Result<Arc<Tab>, String> {
        if let Some(tab) = self.tabs.lock().get(session_id) {
            return Ok(tab.clone());
        }
        let browser = self.browser()?;
        let tab = browser.new_tab().map_err(|e| e.to_string())?;
        self.tabs.lock().insert(session_id.to_string(), tab.clone());
        Ok(tab)
    }
}

pub struct BrowserTool {
    sessions: Arc<BrowserSessions>,
}

impl Default for BrowserTool {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserTool {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(BrowserSessions::default()),
        }
    }
}

/// Execute one action against `tab`. Returns the summary line for this
/// action, any attachment it produced, and whether execution should stop
/// (this action failed, or the action blocked the run before running).
fn run_action(tab: &Tab, action: &Action, label: usize) -> (String, Option<Attachment>, bool) {
    match action {
        Action::Navigate { url } => {
            if is_blocked_scheme(url) {
                return (format!("{label}. Blocked: unsupported URL scheme ({url})"), None, true);
            }
            match tab.navigate_to(url) {
                Ok(_) => {
                    // Commit and best-effort idle waits share one knob in this
                    // crate version; a timeout on either is not fatal — we
                    // still try to extract whatever the page currently shows.
                    if tab.wait_until_navigated().is_err() {
                        return (
                            format!("{label}. Navigated to {url} (did not settle before timeout)"),
                            None,
                            false,
                        );
                    }
                    let _ = tab.wait_for_element_with_custom_timeout("body", NAVIGATE_IDLE_TIMEOUT);
                    (format!("{label}. Navigated to {url}"), None, false)
                }
                Err(e) => (format!("{label}. Navigation failed: {e}"), None, true),
            }
        }
        Action::Click { selector } => match tab.find_element(selector).and_then(|el| el.click()) {
            Ok(_) => (format!("{label}. Clicked {selector}"), None, false),
            Err(e) => (format!("{label}. Click failed on {selector}: {e}"), None, true),
        },
        Action::Type { selector, text } => match tab.find_element(selector) {
            Ok(el) => match el.get_attribute_value("type") {
                Ok(Some(t)) if t.eq_ignore_ascii_case("password") => (
                    format!("{label}. Refused to type into password field {selector}"),
                    None,
                    false,
                ),
                _ => match el.type_into(text) {
                    Ok(_) => (format!("{label}. Typed into {selector}"), None, false),
                    Err(e) => (format!("{label}. Type failed on {selector}: {e}"), None, true),
                },
            },
            Err(e) => (format!("{label}. Type failed on {selector}: {e}"), None, true),
        },
        Action::Screenshot {} => {
            match tab.capture_screenshot(
                headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption::Png,
                None,
                None,
                true,
            ) {
                Ok(bytes) => {
                    let data = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
                    (
                        format!("{label}. Captured screenshot"),
                        Some(Attachment {
                            kind: "image".to_string(),
                            mime_type: "image/png".to_string(),
                            data,
                            name: None,
                        }),
                        false,
                    )
                }
                Err(e) => (format!("{label}. Screenshot failed: {e}"), None, true),
            }
        }
        Action::Extract { selector } => {
            let text = match selector {
                Some(sel) => tab.find_element(sel).and_then(|el| el.get_inner_text()),
                None => tab
                    .find_element("body")
                    .and_then(|el| el.get_inner_text()),
            };
            match text {
                Ok(text) => {
                    let (text, truncated) = if text.chars().count() > EXTRACT_MAX_CHARS {
                        let truncated: String = text.chars().take(EXTRACT_MAX_CHARS).collect();
                        (truncated, true)
                    } else {
                        (text, false)
                    };
                    let suffix = if truncated { " [truncated]" } else { "" };
                    (format!("{label}. Extracted: {text}{suffix}"), None, false)
                }
                Err(e) => (format!("{label}. Extract failed: {e}"), None, true),
            }
        }
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "browser".into(),
            description: "Drive a headless browser: navigate, click, type, screenshot, extract text.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "actions": {
                        "type": "array",
                        "minItems": 1,
                        "maxItems": 20,
                        "items": { "type": "object" },
                    },
                    "sessionId": { "type": "string" },
                },
                "required": ["actions"],
            }),
        }
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value, ctx: &dyn ToolContext) -> Result<ToolResult> {
        let input: BrowserInput = serde_json::from_value(input)
            .map_err(|e| Error::InvalidParams(format!("browser: {e}")))?;
        if input.actions.is_empty() || input.actions.len() > 20 {
            return Err(Error::InvalidParams(
                "browser: actions must contain between 1 and 20 entries".into(),
            ));
        }

        if !ctx.auto_approve() {
            let decision = ctx
                .request_approval(
                    "browser",
                    format!("Run {} browser action(s)", input.actions.len()),
                    serde_json::json!({ "actions": input.actions.len() }),
                )
                .await;
            if let ApprovalDecision::Denied { reason } = decision {
                let output = match reason {
                    Some(r) => format!("Browser actions denied by user: {r}"),
                    None => "Browser actions denied by user".to_string(),
                };
                return Ok(ToolResult {
                    output,
                    exit_code: None,
                    truncated: false,
                    attachments: vec![],
                });
            }
        }

        let session_id = input.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let sessions = self.sessions.clone();
        let sid = session_id.clone();

        let tab = {
            let sessions = sessions.clone();
            let sid = sid.clone();
            tokio::task::spawn_blocking(move || sessions.tab(&sid))
                .await
                .map_err(|e| Error::Internal(format!("browser task panicked: {e}")))?
        };

        let mut lines = Vec::new();
        let mut attachments = Vec::new();

        let tab = match tab {
            Ok(tab) => Some(tab),
            Err(e) => {
                lines.push(format!("Failed to open browser session: {e}"));
                None
            }
        };

        if let Some(tab) = tab {
            for (i, action) in input.actions.into_iter().enumerate() {
                let label = i + 1;
                let description = describe_action(&action);
                let tab = tab.clone();
                let (line, attachment, stop) = tokio::task::spawn_blocking(move || {
                    run_action(&tab, &action, label)
                })
                .await
                .map_err(|e| Error::Internal(format!("browser task panicked: {e}")))?;

                ctx.report_progress(format!("{label}. {description}"));
                lines.push(line);
                if let Some(a) = attachment {
                    attachments.push(a);
                }
                if stop {
                    break;
                }
            }
        }

        let mut output = format!("Session: {session_id}\n");
        output.push_str(&lines.join("\n"));

        ctx.record_exec("browser");
        Ok(ToolResult {
            output,
            exit_code: None,
            truncated: false,
            attachments,
        })
    }
}
