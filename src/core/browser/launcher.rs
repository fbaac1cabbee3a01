// Chrome/Chromium/Edge launcher with CDP (DevTools Protocol) support
// Launches the browser with a throw-away profile, or attaches to one that is
// already listening on the debugging port.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

pub const DEFAULT_CDP_PORT: u16 = 9222;
const STARTUP_TIMEOUT_MS: u64 = 15000;
const CDP_CHECK_INTERVAL_MS: u64 = 200;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";

/// Executables tried on PATH, in order
const BROWSER_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

/// Install locations that are usually not on PATH
const KNOWN_BROWSER_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// How the browser should be started
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Explicit executable; searched on PATH and known locations when absent
    pub executable: Option<PathBuf>,
    pub port: u16,
    pub headless: bool,
    pub user_agent: String,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            port: DEFAULT_CDP_PORT,
            headless: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// `/json/version` reply
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Browser")]
    browser: Option<String>,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: String,
}

/// A browser reachable over CDP
///
/// Kills the process and removes the temporary profile on drop, but only when
/// this instance started them.
pub struct ChromeInstance {
    process: Option<Child>,
    profile_dir: Option<PathBuf>,
    was_running: bool,
    ws_url: String,
    download_dir: PathBuf,
}

impl ChromeInstance {
    /// Reuse a browser already listening on `options.port`, or launch one
    pub fn ensure_running(options: &BrowserOptions) -> Result<Self> {
        if Self::is_cdp_active(options.port) {
            if let Ok(info) = fetch_version(options.port) {
                log::info!(
                    "Attaching to running browser {} on port {}",
                    info.browser.as_deref().unwrap_or("(unknown)"),
                    options.port
                );
                return Ok(Self {
                    process: None,
                    profile_dir: None,
                    was_running: true,
                    ws_url: info.ws_url,
                    download_dir: env::temp_dir()
                        .join(format!("drivecrawl-downloads-{}", std::process::id())),
                });
            }
        }

        let executable = find_browser_executable(options)?;
        let profile_dir = env::temp_dir().join(format!("drivecrawl-profile-{}", std::process::id()));
        fs::create_dir_all(&profile_dir)
            .with_context(|| format!("Failed to create browser profile at {:?}", profile_dir))?;

        log::info!("Launching {:?} with CDP on port {}", executable, options.port);
        let mut process = launch_browser(&executable, &profile_dir, options)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(STARTUP_TIMEOUT_MS);

        let info = loop {
            if Self::is_cdp_active(options.port) {
                if let Ok(info) = fetch_version(options.port) {
                    break info;
                }
            }

            if let Ok(Some(status)) = process.try_wait() {
                let _ = fs::remove_dir_all(&profile_dir);
                return Err(anyhow::anyhow!(
                    "Browser exited during start-up ({}). Is port {} already in use?",
                    status,
                    options.port
                ));
            }

            if start.elapsed() > timeout {
                let _ = process.kill();
                let _ = process.wait();
                let _ = fs::remove_dir_all(&profile_dir);
                return Err(anyhow::anyhow!(
                    "Browser did not open the CDP port {} within {} seconds",
                    options.port,
                    STARTUP_TIMEOUT_MS / 1000
                ));
            }

            std::thread::sleep(Duration::from_millis(CDP_CHECK_INTERVAL_MS));
        };

        log::info!(
            "Browser ready: {}",
            info.browser.as_deref().unwrap_or("(unknown)")
        );

        Ok(Self {
            process: Some(process),
            download_dir: profile_dir.join("downloads"),
            profile_dir: Some(profile_dir),
            was_running: false,
            ws_url: info.ws_url,
        })
    }

    /// Check if CDP port is responding
    pub fn is_cdp_active(port: u16) -> bool {
        std::net::TcpStream::connect_timeout(
            &std::net::SocketAddr::from(([127, 0, 0, 1], port)),
            Duration::from_millis(100),
        )
        .is_ok()
    }

    /// Browser-level WebSocket endpoint
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Directory where Chrome stages downloads before they are saved
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Check if this instance was already running
    pub fn was_already_running(&self) -> bool {
        self.was_running
    }
}

impl Drop for ChromeInstance {
    fn drop(&mut self) {
        if let Some(ref mut process) = self.process {
            log::info!("Closing browser");
            let _ = process.kill();
            let _ = process.wait();
        }
        if let Some(ref dir) = self.profile_dir {
            let _ = fs::remove_dir_all(dir);
        } else {
            let _ = fs::remove_dir_all(&self.download_dir);
        }
    }
}

fn fetch_version(port: u16) -> Result<VersionInfo> {
    reqwest::blocking::Client::new()
        .get(format!("http://127.0.0.1:{}/json/version", port))
        .timeout(Duration::from_secs(2))
        .send()
        .context("Failed to query CDP version endpoint")?
        .json()
        .context("Invalid CDP version response")
}

fn launch_browser(executable: &Path, profile_dir: &Path, options: &BrowserOptions) -> Result<Child> {
    let mut cmd = Command::new(executable);
    cmd.arg(format!("--remote-debugging-port={}", options.port))
        .arg(format!("--user-data-dir={}", profile_dir.display()))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-popup-blocking")
        .arg(format!("--user-agent={}", options.user_agent));

    if options.headless {
        cmd.arg("--headless=new");
    }

    cmd.arg("about:blank")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    cmd.spawn()
        .with_context(|| format!("Failed to start browser {:?}", executable))
}

/// Locate a Chromium-family browser
pub fn find_browser_executable(options: &BrowserOptions) -> Result<PathBuf> {
    if let Some(ref path) = options.executable {
        anyhow::ensure!(path.exists(), "Browser executable not found: {}", path.display());
        return Ok(path.clone());
    }

    if let Some(path) = BROWSER_NAMES.iter().find_map(|name| which::which(name).ok()) {
        return Ok(path);
    }

    if let Ok(local_app_data) = env::var("LOCALAPPDATA") {
        let local_chrome =
            PathBuf::from(local_app_data).join(r"Google\Chrome\Application\chrome.exe");
        if local_chrome.exists() {
            return Ok(local_chrome);
        }
    }

    KNOWN_BROWSER_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .with_context(|| {
            format!(
                "No Chrome, Chromium or Edge found. Searched PATH for {} and {} known locations; \
                 pass --browser <PATH> to choose one",
                BROWSER_NAMES.join(", "),
                KNOWN_BROWSER_PATHS.len()
            )
        })
}
