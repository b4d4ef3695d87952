//! Playwright browser automation
//!
//! Each session is a long-lived `node` process running an embedded bridge
//! script. Commands go to its stdin as one JSON object per line and replies
//! come back the same way on stdout:
//!
//! ```text
//! -> {"id":3,"cmd":"click","locator":[{"css":"#add-item > button"}]}
//! <- {"id":3,"ok":true,"value":null}
//! <- {"id":4,"ok":false,"error":"locator.click: Timeout 10000ms exceeded","kind":"timeout"}
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Browser, ProjectConfig, SuiteConfig, Timeouts, Viewport};
use crate::driver::{DriverFactory, PageDriver, SessionArtifacts};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

const BRIDGE_SCRIPT: &str = r###"
'use strict';
const fs = require('fs');
const readline = require('readline');

function reply(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

let pw;
try {
  pw = require('playwright');
} catch (e) {
  reply({ id: 0, ok: false, kind: 'not_found', error: String(e && e.message || e) });
  process.exit(3);
}

let browser = null;
let context = null;
let page = null;
let tracing = false;

function escapeRegex(s) {
  return s.replace(/[.*+?^${}()|[\]\\]/g, '\\$&');
}

function resolve(steps) {
  let loc = null;
  for (const step of steps) {
    if (step.css !== undefined) {
      loc = loc ? loc.locator(step.css) : page.locator(step.css);
    } else if (step.has_text !== undefined) {
      loc = loc.filter({ hasText: step.has_text });
    } else if (step.has_exact_text !== undefined) {
      loc = loc.filter({ hasText: new RegExp('^\\s*' + escapeRegex(step.has_exact_text) + '\\s*$') });
    } else if (step.nth !== undefined) {
      loc = loc.nth(step.nth);
    }
  }
  return loc;
}

async function first(steps) {
  const loc = resolve(steps);
  return (await loc.count()) > 0 ? loc.first() : null;
}

const handlers = {
  async launch(msg) {
    const engine = pw[msg.browser];
    const device = msg.device ? pw.devices[msg.device] : {};
    if (msg.device && !device) {
      throw new Error('unknown device ' + msg.device);
    }
    browser = await engine.launch({ headless: msg.headless });
    const options = { ...device, viewport: msg.viewport, baseURL: msg.base_url };
    if (msg.browser !== 'firefox') {
      options.isMobile = msg.is_mobile;
      options.hasTouch = msg.is_mobile;
    }
    if (msg.video_dir) {
      options.recordVideo = { dir: msg.video_dir, size: msg.viewport };
    }
    context = await browser.newContext(options);
    context.setDefaultTimeout(msg.action_timeout);
    context.setDefaultNavigationTimeout(msg.navigation_timeout);
    if (msg.trace) {
      await context.tracing.start({ screenshots: true, snapshots: true });
      tracing = true;
    }
    page = await context.newPage();
    return browser.version();
  },
  async goto(msg) { await page.goto(msg.url); return null; },
  async reload() { await page.reload(); return null; },
  async url() { return page.url(); },
  async click(msg) { await resolve(msg.locator).first().click(); return null; },
  async fill(msg) { await resolve(msg.locator).first().fill(msg.value); return null; },
  async press(msg) { await resolve(msg.locator).first().press(msg.key); return null; },
  async focus(msg) { await resolve(msg.locator).first().focus(); return null; },
  async count(msg) { return await resolve(msg.locator).count(); },
  async is_visible(msg) { return await resolve(msg.locator).first().isVisible(); },
  async is_enabled(msg) {
    const el = await first(msg.locator);
    return el ? await el.isEnabled() : false;
  },
  async is_focused(msg) {
    const el = await first(msg.locator);
    return el ? await el.evaluate((node) => node === document.activeElement) : false;
  },
  async input_value(msg) {
    const el = await first(msg.locator);
    if (!el) return null;
    try { return await el.inputValue(); } catch (e) { return null; }
  },
  async text_content(msg) {
    const el = await first(msg.locator);
    return el ? await el.textContent() : null;
  },
  async computed_style(msg) {
    const el = await first(msg.locator);
    return el ? await el.evaluate((node, prop) => getComputedStyle(node).getPropertyValue(prop), msg.property) : null;
  },
  async get_attribute(msg) {
    const el = await first(msg.locator);
    return el ? await el.getAttribute(msg.name) : null;
  },
  async set_viewport(msg) { await page.setViewportSize(msg.viewport); return null; },
  async screenshot(msg) { await page.screenshot({ path: msg.path, fullPage: true }); return msg.path; },
  async close(msg) {
    const kept = [];
    if (tracing) {
      if (msg.keep) {
        await context.tracing.stop({ path: msg.trace_path });
        kept.push(msg.trace_path);
      } else {
        await context.tracing.stop();
      }
    }
    const video = page ? page.video() : null;
    if (context) await context.close();
    if (browser) await browser.close();
    if (video) {
      const path = await video.path();
      if (msg.keep) kept.push(path); else fs.rmSync(path, { force: true });
    }
    return kept;
  },
};

const rl = readline.createInterface({ input: process.stdin });
let queue = Promise.resolve();
rl.on('line', (line) => {
  queue = queue.then(async () => {
    let msg;
    try {
      msg = JSON.parse(line);
    } catch (e) {
      reply({ id: 0, ok: false, kind: 'driver', error: 'bad command: ' + e.message });
      return;
    }
    const handler = handlers[msg.cmd];
    if (!handler) {
      reply({ id: msg.id, ok: false, kind: 'driver', error: 'unknown command ' + msg.cmd });
      return;
    }
    try {
      const value = await handler(msg);
      reply({ id: msg.id, ok: true, value: value === undefined ? null : value });
    } catch (e) {
      const kind = e && e.name === 'TimeoutError' ? 'timeout' : 'driver';
      reply({ id: msg.id, ok: false, kind, error: String(e && e.message || e) });
    }
    if (msg.cmd === 'close') {
      process.exit(0);
    }
  });
});
rl.on('close', async () => {
  if (browser) await browser.close().catch(() => {});
  process.exit(0);
});
"###;

/// Commands understood by the bridge script
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BridgeCommand {
    Launch {
        browser: Browser,
        device: Option<String>,
        viewport: Viewport,
        is_mobile: bool,
        headless: bool,
        base_url: String,
        action_timeout: u64,
        navigation_timeout: u64,
        video_dir: Option<PathBuf>,
        trace: bool,
    },
    Goto { url: String },
    Reload,
    Url,
    Click { locator: Locator },
    Fill { locator: Locator, value: String },
    Press { locator: Locator, key: String },
    Focus { locator: Locator },
    Count { locator: Locator },
    IsVisible { locator: Locator },
    IsEnabled { locator: Locator },
    IsFocused { locator: Locator },
    InputValue { locator: Locator },
    TextContent { locator: Locator },
    ComputedStyle { locator: Locator, property: String },
    GetAttribute { locator: Locator, name: String },
    SetViewport { viewport: Viewport },
    Screenshot { path: PathBuf },
    Close { keep: bool, trace_path: PathBuf },
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a BridgeCommand,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

impl BridgeReply {
    fn into_result(self) -> E2eResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown bridge error".to_string());
        Err(match self.kind.as_deref() {
            Some("timeout") => E2eError::Timeout(message),
            Some("not_found") => E2eError::DriverNotFound,
            _ => E2eError::Driver(message),
        })
    }
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    child: Child,
}

/// Read lines until the reply for `id` arrives. Non-JSON output is logged.
async fn read_reply(io: &mut BridgeIo, id: u64) -> E2eResult<serde_json::Value> {
    loop {
        let Some(raw) = io.stdout.next_line().await? else {
            return Err(E2eError::BridgeClosed(
                "bridge exited without replying".into(),
            ));
        };
        match serde_json::from_str::<BridgeReply>(&raw) {
            // id 0 is the bridge failing before it could read a command
            Ok(reply) if reply.id == id || (reply.id == 0 && !reply.ok) => {
                return reply.into_result();
            }
            Ok(reply) => warn!("dropping stale bridge reply {}", reply.id),
            Err(_) => debug!("[bridge stdout] {}", raw),
        }
    }
}

/// One browser session behind a bridge process
pub struct PlaywrightPage {
    io: Mutex<Option<BridgeIo>>,
    next_id: AtomicU64,
    artifacts: SessionArtifacts,
    // Upper bound for a single round trip, on top of Playwright's own timeouts
    reply_timeout: Duration,
}

impl PlaywrightPage {
    async fn spawn(
        node: &str,
        script: &Path,
        project: &ProjectConfig,
        settings: &BridgeSettings,
        artifacts: &SessionArtifacts,
    ) -> E2eResult<Self> {
        let mut child = TokioCommand::new(node)
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => E2eError::DriverNotFound,
                _ => E2eError::Driver(format!("failed to spawn {}: {}", node, e)),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(E2eError::Driver("bridge stdio was not captured".into()));
        };
        if let Some(stderr) = child.stderr.take() {
            let project = project.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(project = %project, "[bridge] {}", line);
                }
            });
        }

        let timeouts = settings.timeouts;
        let page = Self {
            io: Mutex::new(Some(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
                child,
            })),
            next_id: AtomicU64::new(1),
            artifacts: artifacts.clone(),
            reply_timeout: timeouts.navigation().max(timeouts.action()) + Duration::from_secs(30),
        };

        let version: Option<String> = page
            .call_as(BridgeCommand::Launch {
                browser: project.browser,
                device: project.device.clone(),
                viewport: project.viewport_or(Viewport::default()),
                is_mobile: project.is_mobile(),
                headless: settings.headless,
                base_url: settings.base_url.clone(),
                action_timeout: timeouts.action_ms,
                navigation_timeout: timeouts.navigation_ms,
                video_dir: artifacts.record_video.then(|| artifacts.video_dir()),
                trace: artifacts.record_trace,
            })
            .await?;
        debug!(
            project = %project.name,
            browser = project.browser.as_str(),
            version = version.as_deref().unwrap_or("?"),
            "browser session launched"
        );
        Ok(page)
    }

    async fn call(&self, command: BridgeCommand) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&Envelope {
            id,
            command: &command,
        })?;
        line.push('\n');

        let mut guard = self.io.lock().await;
        let io = guard
            .as_mut()
            .ok_or_else(|| E2eError::BridgeClosed("session already closed".into()))?;

        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        let outcome = tokio::time::timeout(self.reply_timeout, read_reply(io, id)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                // A wedged bridge cannot be trusted with further commands.
                if let Some(mut io) = guard.take() {
                    let _ = io.child.start_kill();
                }
                Err(E2eError::Timeout(format!(
                    "bridge reply to command {} after {:?}",
                    id, self.reply_timeout
                )))
            }
        }
    }

    async fn call_as<T: DeserializeOwned>(&self, command: BridgeCommand) -> E2eResult<T> {
        let value = self.call(command).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl PageDriver for PlaywrightPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call(BridgeCommand::Goto { url: url.to_string() }).await?;
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        self.call(BridgeCommand::Reload).await?;
        Ok(())
    }

    async fn url(&self) -> E2eResult<String> {
        self.call_as(BridgeCommand::Url).await
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.call(BridgeCommand::Click { locator: locator.clone() }).await?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call(BridgeCommand::Fill {
            locator: locator.clone(),
            value: value.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()> {
        self.call(BridgeCommand::Press {
            locator: locator.clone(),
            key: key.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn focus(&self, locator: &Locator) -> E2eResult<()> {
        self.call(BridgeCommand::Focus { locator: locator.clone() }).await?;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        self.call_as(BridgeCommand::Count { locator: locator.clone() }).await
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        self.call_as(BridgeCommand::IsVisible { locator: locator.clone() }).await
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        self.call_as(BridgeCommand::IsEnabled { locator: locator.clone() }).await
    }

    async fn is_focused(&self, locator: &Locator) -> E2eResult<bool> {
        self.call_as(BridgeCommand::IsFocused { locator: locator.clone() }).await
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<Option<String>> {
        self.call_as(BridgeCommand::InputValue { locator: locator.clone() }).await
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        self.call_as(BridgeCommand::TextContent { locator: locator.clone() }).await
    }

    async fn computed_style(
        &self,
        locator: &Locator,
        property: &str,
    ) -> E2eResult<Option<String>> {
        self.call_as(BridgeCommand::ComputedStyle {
            locator: locator.clone(),
            property: property.to_string(),
        })
        .await
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        self.call_as(BridgeCommand::GetAttribute {
            locator: locator.clone(),
            name: name.to_string(),
        })
        .await
    }

    async fn set_viewport(&self, viewport: Viewport) -> E2eResult<()> {
        self.call(BridgeCommand::SetViewport { viewport }).await?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<PathBuf> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.call_as(BridgeCommand::Screenshot { path: path.to_path_buf() }).await
    }

    async fn close(&self, keep_artifacts: bool) -> E2eResult<Vec<PathBuf>> {
        if self.io.lock().await.is_none() {
            return Ok(Vec::new());
        }
        let kept: Vec<PathBuf> = self
            .call_as(BridgeCommand::Close {
                keep: keep_artifacts,
                trace_path: self.artifacts.trace_path(),
            })
            .await?;

        if let Some(mut io) = self.io.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(5), io.child.wait())
                .await
                .is_err()
            {
                let _ = io.child.start_kill();
            }
        }
        Ok(kept)
    }
}

/// Launch settings shared by every session of a run
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub base_url: String,
    pub headless: bool,
    pub timeouts: Timeouts,
}

/// Opens Playwright sessions through the Node bridge
pub struct PlaywrightDriverFactory {
    node: String,
    script: PathBuf,
    settings: BridgeSettings,
}

impl PlaywrightDriverFactory {
    /// Check for `node`, then write the bridge script under `output_dir`
    pub fn new(config: &SuiteConfig) -> E2eResult<Self> {
        let node = std::env::var("TODO_E2E_NODE").unwrap_or_else(|_| "node".to_string());
        Self::check_node_installed(&node)?;

        let driver_dir = config.output_dir.join(".driver");
        std::fs::create_dir_all(&driver_dir)?;
        let script = driver_dir.join("playwright-bridge.js");
        std::fs::write(&script, BRIDGE_SCRIPT)?;
        info!("Playwright bridge written to {}", script.display());

        Ok(Self {
            node,
            script,
            settings: BridgeSettings {
                base_url: config.base_url.clone(),
                headless: config.headless,
                timeouts: config.timeouts,
            },
        })
    }

    fn check_node_installed(node: &str) -> E2eResult<()> {
        let status = Command::new(node)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::DriverNotFound),
        }
    }
}

#[async_trait]
impl DriverFactory for PlaywrightDriverFactory {
    fn name(&self) -> &str {
        "playwright"
    }

    async fn open(
        &self,
        project: &ProjectConfig,
        artifacts: &SessionArtifacts,
    ) -> E2eResult<Box<dyn PageDriver>> {
        if artifacts.record_video {
            tokio::fs::create_dir_all(artifacts.video_dir()).await?;
        }
        let page =
            PlaywrightPage::spawn(&self.node, &self.script, project, &self.settings, artifacts)
                .await?;
        Ok(Box::new(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let command = BridgeCommand::Fill {
            locator: Locator::css("#new-task"),
            value: "Buy milk".into(),
        };
        let json = serde_json::to_value(Envelope { id: 7, command: &command }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "cmd": "fill",
                "locator": [{ "css": "#new-task" }],
                "value": "Buy milk"
            })
        );

        let json = serde_json::to_value(Envelope { id: 1, command: &BridgeCommand::Reload }).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 1, "cmd": "reload" }));
    }

    #[test]
    fn test_launch_carries_project_settings() {
        let command = BridgeCommand::Launch {
            browser: Browser::Webkit,
            device: Some("iPhone 12".into()),
            viewport: Viewport::new(390, 664),
            is_mobile: true,
            headless: true,
            base_url: "http://127.0.0.1:8080/".into(),
            action_timeout: 10_000,
            navigation_timeout: 30_000,
            video_dir: None,
            trace: false,
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["cmd"], "launch");
        assert_eq!(json["browser"], "webkit");
        assert_eq!(json["viewport"]["width"], 390);
        assert_eq!(json["device"], "iPhone 12");
        assert_eq!(json["is_mobile"], true);
    }

    #[test]
    fn test_reply_error_kinds() {
        let reply: BridgeReply =
            serde_json::from_str(r#"{"id":2,"ok":false,"kind":"timeout","error":"Timeout 10000ms exceeded"}"#)
                .unwrap();
        assert!(matches!(reply.into_result(), Err(E2eError::Timeout(_))));

        let reply: BridgeReply =
            serde_json::from_str(r#"{"id":0,"ok":false,"kind":"not_found","error":"Cannot find module"}"#)
                .unwrap();
        assert!(matches!(reply.into_result(), Err(E2eError::DriverNotFound)));

        let reply: BridgeReply = serde_json::from_str(r#"{"id":3,"ok":true,"value":4}"#).unwrap();
        assert_eq!(reply.into_result().unwrap(), serde_json::json!(4));

        let reply: BridgeReply = serde_json::from_str(r#"{"id":3,"ok":true}"#).unwrap();
        assert!(reply.into_result().unwrap().is_null());
    }

    #[test]
    fn test_missing_node_is_driver_not_found() {
        assert!(matches!(
            PlaywrightDriverFactory::check_node_installed("definitely-not-node-7f3a"),
            Err(E2eError::DriverNotFound)
        ));
    }
}
