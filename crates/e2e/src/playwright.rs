//! Playwright browser automation
//!
//! Each [`PlaywrightPage`] owns a `node` process running a small driver
//! script. Requests and replies are exchanged as one JSON object per line
//! over the child's stdin/stdout, so a page keeps its browser state across
//! calls instead of relaunching per step.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::browser::{Locator, Page, PageLauncher};
use crate::error::{E2eError, E2eResult};

/// Slack added on top of Playwright's own timeout so its error message wins the race
const REPLY_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Default timeout for every locator action
    pub action_timeout: Duration,
    /// Time allowed for the browser to start
    pub launch_timeout: Duration,
    pub node_binary: PathBuf,
    /// Directory holding the `playwright` package (defaults to `./node_modules`)
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout: Duration::from_secs(10),
            launch_timeout: Duration::from_secs(30),
            node_binary: PathBuf::from("node"),
            node_path: None,
        }
    }
}

impl PlaywrightConfig {
    fn resolved_node_path(&self) -> E2eResult<PathBuf> {
        match &self.node_path {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?.join("node_modules")),
        }
    }
}

/// Options handed to the driver script as its single argument
#[derive(Debug, Serialize)]
struct DriverOptions<'a> {
    browser: &'static str,
    headless: bool,
    base_url: &'a str,
    viewport: Viewport,
    timeout_ms: u64,
    storage_state: Option<&'a Path>,
}

#[derive(Debug, Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverRequest<'a> {
    Goto { path: &'a str },
    Fill { locator: &'a Locator, value: &'a str },
    Click { locator: &'a Locator },
    Check { locator: &'a Locator },
    IsChecked { locator: &'a Locator },
    WaitForText { text: &'a str, timeout_ms: u64 },
    Url,
    RowCells { locator: &'a Locator },
    StorageState { path: &'a Path },
    Close,
}

impl DriverRequest<'_> {
    fn step_name(&self) -> String {
        match self {
            DriverRequest::Goto { path } => format!("goto:{}", path),
            DriverRequest::Fill { locator, .. } => format!("fill:{}", locator.describe()),
            DriverRequest::Click { locator } => format!("click:{}", locator.describe()),
            DriverRequest::Check { locator } => format!("check:{}", locator.describe()),
            DriverRequest::IsChecked { locator } => format!("is_checked:{}", locator.describe()),
            DriverRequest::WaitForText { text, .. } => {
                format!("wait_for_text:{}", text.chars().take(30).collect::<String>())
            }
            DriverRequest::Url => "url".to_string(),
            DriverRequest::RowCells { locator } => format!("row_cells:{}", locator.describe()),
            DriverRequest::StorageState { .. } => "storage_state".to_string(),
            DriverRequest::Close => "close".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a DriverRequest<'a>,
}

#[derive(Debug, Deserialize)]
struct DriverReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

struct DriverIo {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

/// A live browser page driven through Playwright
pub struct PlaywrightPage {
    io: tokio::sync::Mutex<Option<DriverIo>>,
    next_id: AtomicU64,
    action_timeout: Duration,
    // Holds driver.js for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightPage {
    /// Launch a browser, optionally loading a storage-state file
    pub async fn launch(config: &PlaywrightConfig, storage_state: Option<&Path>) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, build_script())?;

        let options = DriverOptions {
            browser: config.browser.as_str(),
            headless: config.headless,
            base_url: &config.base_url,
            viewport: Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
            },
            timeout_ms: config.action_timeout.as_millis() as u64,
            storage_state,
        };

        debug!("Launching Playwright driver: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .arg(serde_json::to_string(&options)?)
            .env("NODE_PATH", config.resolved_node_path()?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".to_string()))?;

        let mut io = DriverIo {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        };

        tokio::time::timeout(config.launch_timeout, read_reply(&mut io.lines, 0))
            .await
            .map_err(|_| E2eError::Timeout(format!("{} launch", config.browser.as_str())))??;

        info!(
            browser = config.browser.as_str(),
            authenticated = storage_state.is_some(),
            "Browser page ready"
        );

        Ok(Self {
            io: tokio::sync::Mutex::new(Some(io)),
            next_id: AtomicU64::new(1),
            action_timeout: config.action_timeout,
            _script_dir: script_dir,
        })
    }

    async fn send(&self, request: DriverRequest<'_>, timeout: Duration) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let step = request.step_name();
        let line = serde_json::to_string(&Envelope { id, request: &request })?;

        let mut guard = self.io.lock().await;
        let io = guard
            .as_mut()
            .ok_or_else(|| E2eError::Playwright(format!("{}: page is closed", step)))?;

        debug!("Executing step: {}", step);

        let exchange = async {
            io.stdin.write_all(line.as_bytes()).await?;
            io.stdin.write_all(b"\n").await?;
            io.stdin.flush().await?;
            read_reply(&mut io.lines, id).await
        };

        let reply = tokio::time::timeout(timeout + REPLY_MARGIN, exchange)
            .await
            .map_err(|_| E2eError::Timeout(step.clone()))??;

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(E2eError::Playwright(format!(
                "{}: {}",
                step,
                reply.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }

    async fn action(&self, request: DriverRequest<'_>) -> E2eResult<Value> {
        self.send(request, self.action_timeout).await
    }
}

/// Read lines until the reply carrying `id` arrives. Replies to requests that
/// already timed out on our side are skipped.
async fn read_reply(lines: &mut Lines<BufReader<ChildStdout>>, id: u64) -> E2eResult<DriverReply> {
    loop {
        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| E2eError::Playwright("driver exited unexpectedly".to_string()))?;
        match serde_json::from_str::<DriverReply>(&line) {
            Ok(reply) if reply.id == id => return Ok(reply),
            Ok(reply) => debug!("Skipping stale reply {}", reply.id),
            Err(_) => debug!("[driver] {}", line),
        }
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&self, path: &str) -> E2eResult<()> {
        self.action(DriverRequest::Goto { path }).await.map(|_| ())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.action(DriverRequest::Fill { locator, value }).await.map(|_| ())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.action(DriverRequest::Click { locator }).await.map(|_| ())
    }

    async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.action(DriverRequest::Check { locator }).await.map(|_| ())
    }

    async fn is_checked(&self, locator: &Locator) -> E2eResult<bool> {
        let value = self.action(DriverRequest::IsChecked { locator }).await?;
        value
            .as_bool()
            .ok_or_else(|| E2eError::Playwright(format!("is_checked returned {}", value)))
    }

    async fn wait_for_text(&self, text: &str, timeout: Duration) -> E2eResult<()> {
        let request = DriverRequest::WaitForText {
            text,
            timeout_ms: timeout.as_millis() as u64,
        };
        self.send(request, timeout).await.map(|_| ())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let value = self.action(DriverRequest::Url).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn row_cells(&self, row: &Locator) -> E2eResult<Option<Vec<String>>> {
        let value = self.action(DriverRequest::RowCells { locator: row }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn save_storage_state(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        self.action(DriverRequest::StorageState { path: &absolute })
            .await
            .map(|_| ())
    }

    async fn close(&self) -> E2eResult<()> {
        if let Err(e) = self.action(DriverRequest::Close).await {
            warn!("Graceful browser close failed: {}", e);
        }

        let Some(mut io) = self.io.lock().await.take() else {
            return Ok(());
        };

        if let Ok(Some(_)) = io.child.try_wait() {
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pid) = io.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && tokio::time::timeout(Duration::from_millis(500), io.child.wait())
                    .await
                    .is_ok()
            {
                return Ok(());
            }
        }

        io.child.kill().await?;
        Ok(())
    }
}

/// Launches [`PlaywrightPage`]s
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Verify Playwright is installed and create a launcher
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config)?;
        Ok(Self { config })
    }

    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let status = Command::new(&config.node_binary)
            .args(["-e", "require.resolve('playwright')"])
            .env("NODE_PATH", config.resolved_node_path()?)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

#[async_trait]
impl PageLauncher for PlaywrightLauncher {
    async fn launch(&self, storage_state: Option<&Path>) -> E2eResult<Arc<dyn Page>> {
        let page = PlaywrightPage::launch(&self.config, storage_state).await?;
        Ok(Arc::new(page))
    }
}

/// The driver script run by `node`. Options arrive as JSON in `argv[2]`.
pub fn build_script() -> &'static str {
    DRIVER_SCRIPT
}

const DRIVER_SCRIPT: &str = r#"
const playwright = require('playwright');
const readline = require('readline');

const options = JSON.parse(process.argv[2]);

function exactText(text) {
  return new RegExp('^\\s*' + text.replace(/[.*+?^${}()|[\]\\]/g, '\\$&') + '\\s*$');
}

function locate(page, l) {
  switch (l.by) {
    case 'css': return page.locator(l.selector);
    case 'label': return page.getByLabel(l.label);
    case 'role': return l.name ? page.getByRole(l.role, { name: l.name }) : page.getByRole(l.role);
    case 'text': return page.getByText(l.text);
    case 'row': {
      const rows = page.locator(l.table).locator('tr');
      const row = (l.column == null
        ? rows.filter({ hasText: l.has_text })
        : rows.filter({
            has: page.locator(`td:nth-child(${l.column + 1})`, { hasText: exactText(l.has_text) }),
          })).first();
      return l.inner ? row.locator(l.inner) : row;
    }
    default: throw new Error('unknown locator: ' + l.by);
  }
}

function reply(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

(async () => {
  const browser = await playwright[options.browser].launch({ headless: options.headless });
  const contextOptions = { baseURL: options.base_url, viewport: options.viewport };
  if (options.storage_state) {
    contextOptions.storageState = options.storage_state;
  }
  const context = await browser.newContext(contextOptions);
  context.setDefaultTimeout(options.timeout_ms);
  const page = await context.newPage();
  reply({ id: 0, ok: true, value: 'ready' });

  const input = readline.createInterface({ input: process.stdin });
  for await (const line of input) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    try {
      let value = null;
      switch (req.op) {
        case 'goto':
          await page.goto(req.path);
          break;
        case 'fill':
          await locate(page, req.locator).fill(req.value);
          break;
        case 'click':
          await locate(page, req.locator).click();
          break;
        case 'check':
          await locate(page, req.locator).check();
          break;
        case 'is_checked':
          value = await locate(page, req.locator).isChecked();
          break;
        case 'wait_for_text':
          await page.waitForFunction(
            (text) => document.body && document.body.innerText.includes(text),
            req.text,
            { timeout: req.timeout_ms }
          );
          break;
        case 'url':
          value = page.url();
          break;
        case 'row_cells': {
          const row = locate(page, req.locator);
          value = (await row.count()) > 0
            ? (await row.first().locator('td, th').allTextContents()).map((t) => t.trim())
            : null;
          break;
        }
        case 'storage_state':
          await context.storageState({ path: req.path });
          break;
        case 'close':
          reply({ id: req.id, ok: true, value: null });
          await browser.close();
          process.exit(0);
        default:
          throw new Error('unknown op: ' + req.op);
      }
      reply({ id: req.id, ok: true, value });
    } catch (error) {
      reply({ id: req.id, ok: false, error: error.message });
    }
  }
  await browser.close();
})().catch((error) => {
  process.stderr.write(String((error && error.stack) || error) + '\n');
  process.exit(1);
});
"#;
