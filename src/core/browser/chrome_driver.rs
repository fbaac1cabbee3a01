// PageDriver implementation on top of the Chrome DevTools Protocol
//
// Pages are real tabs created with Target.createTarget and attached in
// flatten mode. Downloads are staged by Chrome in `download_dir` under their
// GUID (behavior "allowAndName") and moved into place by `save_download`.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::cdp::{CdpConnection, CdpEvent};
use super::{
    DownloadHandle, DriverError, DriverResult, ElementHandle, PageDriver, PageId, WaitUntil,
};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const TEXT_FN: &str =
    "function() { return ((this.innerText || this.textContent || '') + '').trim(); }";
const CLICK_FN: &str =
    "function() { this.scrollIntoView({block: 'center'}); this.click(); return true; }";

/// Chrome-backed page driver
pub struct ChromeDriver {
    conn: CdpConnection,
    /// target id -> flattened session id
    sessions: HashMap<String, String>,
    /// Main frame ids of pages already closed
    closed_frames: HashSet<String>,
    /// GUIDs of downloads nobody is waiting for; their staged files get removed
    stale_downloads: HashSet<String>,
    download_dir: PathBuf,
}

impl ChromeDriver {
    /// Attach to the browser endpoint and route downloads into `download_dir`
    pub fn connect(ws_url: &str, download_dir: &Path) -> DriverResult<Self> {
        fs::create_dir_all(download_dir)?;

        let mut conn = CdpConnection::connect(ws_url)?;
        conn.call(
            "Browser.setDownloadBehavior",
            json!({
                "behavior": "allowAndName",
                "downloadPath": download_dir.to_string_lossy(),
                "eventsEnabled": true,
            }),
            None,
            COMMAND_TIMEOUT,
        )?;

        Ok(Self {
            conn,
            sessions: HashMap::new(),
            closed_frames: HashSet::new(),
            stale_downloads: HashSet::new(),
            download_dir: download_dir.to_path_buf(),
        })
    }

    /// Forget buffered download events and delete what they left behind
    ///
    /// `Browser.download*` events carry no session, so anything still buffered
    /// when a page closes or before a new click belongs to an attempt that
    /// already gave up on it.
    fn drop_stale_downloads(&mut self) {
        let mut started = Vec::new();
        let mut finished = Vec::new();
        self.conn.discard_events(|e| match e.method.as_str() {
            "Browser.downloadWillBegin" => {
                if let Some(guid) = e.params["guid"].as_str() {
                    started.push(guid.to_string());
                }
                true
            }
            "Browser.downloadProgress" => {
                if is_terminal_progress(e) {
                    if let Some(guid) = e.params["guid"].as_str() {
                        finished.push(guid.to_string());
                    }
                }
                true
            }
            _ => false,
        });

        for guid in &started {
            log::debug!("Dropping stale download {}", guid);
        }
        self.stale_downloads.extend(started);

        let download_dir = &self.download_dir;
        self.stale_downloads.retain(|guid| {
            let removed = fs::remove_file(download_dir.join(guid)).is_ok();
            // Still in flight: try again on the next sweep
            !removed && !finished.contains(guid)
        });
    }

    fn session(&self, page: &PageId) -> DriverResult<String> {
        self.sessions
            .get(&page.0)
            .cloned()
            .ok_or_else(|| DriverError::Protocol(format!("page {} is not open", page.0)))
    }

    fn page_call(&mut self, page: &PageId, method: &str, params: Value) -> DriverResult<Value> {
        let session = self.session(page)?;
        self.conn
            .call(method, params, Some(&session), COMMAND_TIMEOUT)
    }

    /// Run `function_declaration` with `this` bound to the element
    fn call_on_element(
        &mut self,
        page: &PageId,
        element: ElementHandle,
        function_declaration: &str,
    ) -> DriverResult<Value> {
        let resolved = self
            .page_call(page, "DOM.resolveNode", json!({ "nodeId": element.0 }))
            .map_err(not_found_as_missing)?;
        let object_id = resolved["object"]["objectId"]
            .as_str()
            .ok_or(DriverError::NoSuchElement)?
            .to_string();

        let result = self.page_call(
            page,
            "Runtime.callFunctionOn",
            json!({
                "objectId": object_id,
                "functionDeclaration": function_declaration,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        );

        let _ = self.page_call(page, "Runtime.releaseObject", json!({ "objectId": object_id }));

        runtime_value(result?)
    }
}

impl PageDriver for ChromeDriver {
    fn open_page(&mut self) -> DriverResult<PageId> {
        let created = self.conn.call(
            "Target.createTarget",
            json!({ "url": "about:blank" }),
            None,
            COMMAND_TIMEOUT,
        )?;
        let target_id = created["targetId"]
            .as_str()
            .ok_or_else(|| DriverError::Protocol("createTarget returned no targetId".into()))?
            .to_string();

        let attached = self.conn.call(
            "Target.attachToTarget",
            json!({ "targetId": target_id, "flatten": true }),
            None,
            COMMAND_TIMEOUT,
        )?;
        let session_id = attached["sessionId"]
            .as_str()
            .ok_or_else(|| DriverError::Protocol("attachToTarget returned no sessionId".into()))?
            .to_string();

        self.conn
            .call("Page.enable", json!({}), Some(&session_id), COMMAND_TIMEOUT)?;

        log::debug!("Opened page {} (session {})", target_id, session_id);
        self.sessions.insert(target_id.clone(), session_id);
        Ok(PageId(target_id))
    }

    fn close_page(&mut self, page: &PageId) -> DriverResult<()> {
        if let Some(session) = self.sessions.remove(&page.0) {
            self.conn
                .discard_events(|e| e.session_id.as_deref() == Some(session.as_str()));
        }
        // A page target's id is also its main frame id
        self.closed_frames.insert(page.0.clone());
        self.drop_stale_downloads();
        self.conn.call(
            "Target.closeTarget",
            json!({ "targetId": page.0 }),
            None,
            COMMAND_TIMEOUT,
        )?;
        Ok(())
    }

    fn navigate(
        &mut self,
        page: &PageId,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> DriverResult<()> {
        let session = self.session(page)?;
        let milestone = match wait {
            WaitUntil::DomContentLoaded => "Page.domContentEventFired",
            WaitUntil::Load => "Page.loadEventFired",
        };

        // Load events left over from the previous document
        self.conn.discard_events(|e| {
            e.session_id.as_deref() == Some(session.as_str()) && e.method == milestone
        });

        let started = Instant::now();
        let result = self
            .conn
            .call("Page.navigate", json!({ "url": url }), Some(&session), timeout)?;

        if let Some(error_text) = result["errorText"].as_str() {
            if !error_text.is_empty() {
                return Err(DriverError::Navigation {
                    url: url.to_string(),
                    reason: error_text.to_string(),
                });
            }
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        self.conn
            .wait_for_event(milestone, remaining, |e| {
                e.method == milestone && e.session_id.as_deref() == Some(session.as_str())
            })
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn query_all(&mut self, page: &PageId, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let document = self.page_call(page, "DOM.getDocument", json!({ "depth": 0 }))?;
        let root = document["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| DriverError::Protocol("getDocument returned no root".into()))?;

        let found = self.page_call(
            page,
            "DOM.querySelectorAll",
            json!({ "nodeId": root, "selector": selector }),
        )?;

        Ok(found["nodeIds"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_i64)
                    .map(ElementHandle)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_attribute(
        &mut self,
        page: &PageId,
        element: ElementHandle,
        name: &str,
    ) -> DriverResult<Option<String>> {
        let attrs = self
            .page_call(page, "DOM.getAttributes", json!({ "nodeId": element.0 }))
            .map_err(not_found_as_missing)?;

        // Flat list: [name0, value0, name1, value1, ...]
        let flat = attrs["attributes"].as_array().cloned().unwrap_or_default();
        Ok(flat
            .chunks(2)
            .find(|pair| pair[0].as_str() == Some(name))
            .and_then(|pair| pair.get(1))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn get_text(&mut self, page: &PageId, element: ElementHandle) -> DriverResult<String> {
        let value = self.call_on_element(page, element, TEXT_FN)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn evaluate(&mut self, page: &PageId, script: &str) -> DriverResult<Value> {
        let result = self.page_call(
            page,
            "Runtime.evaluate",
            json!({
                "expression": script,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        )?;
        runtime_value(result)
    }

    fn click(&mut self, page: &PageId, element: ElementHandle) -> DriverResult<()> {
        // Any download seen from here on was started by this click
        self.drop_stale_downloads();
        self.call_on_element(page, element, CLICK_FN)?;
        Ok(())
    }

    fn await_download(&mut self, _page: &PageId, timeout: Duration) -> DriverResult<DownloadHandle> {
        let started = Instant::now();

        // Browser.* download events carry no session; one crawl worker means
        // at most one live download, and closed pages are filtered by frame.
        let closed_frames = &self.closed_frames;
        let stale_downloads = &self.stale_downloads;
        let begin = self
            .conn
            .wait_for_event("download to start", timeout, |e| {
                e.method == "Browser.downloadWillBegin"
                    && !e.params["frameId"]
                        .as_str()
                        .is_some_and(|frame| closed_frames.contains(frame))
                    && !e.params["guid"]
                        .as_str()
                        .is_some_and(|guid| stale_downloads.contains(guid))
            })?;

        let guid = begin.params["guid"]
            .as_str()
            .ok_or_else(|| DriverError::Protocol("downloadWillBegin without guid".into()))?
            .to_string();
        let handle = DownloadHandle {
            id: guid.clone(),
            suggested_filename: begin.params["suggestedFilename"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            url: begin.params["url"].as_str().unwrap_or_default().to_string(),
        };
        log::debug!("Download started: {} ({})", handle.suggested_filename, guid);

        let remaining = timeout.saturating_sub(started.elapsed());
        let done = match self.conn.wait_for_event("download to finish", remaining, |e| {
            e.method == "Browser.downloadProgress"
                && e.params["guid"].as_str() == Some(guid.as_str())
                && is_terminal_progress(e)
        }) {
            Ok(done) => done,
            Err(e) => {
                // Left running: its file is removed once it lands
                self.stale_downloads.insert(guid);
                return Err(e);
            }
        };

        if done.params["state"].as_str() == Some("canceled") {
            return Err(DriverError::Protocol(format!(
                "download of {} was canceled by the browser",
                handle.suggested_filename
            )));
        }

        Ok(handle)
    }

    fn save_download(&mut self, download: &DownloadHandle, path: &Path) -> DriverResult<()> {
        let staged = self.download_dir.join(&download.id);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // rename fails across filesystems; fall back to copy + remove
        if fs::rename(&staged, path).is_err() {
            fs::copy(&staged, path)?;
            fs::remove_file(&staged)?;
        }

        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        for guid in &self.stale_downloads {
            let _ = fs::remove_file(self.download_dir.join(guid));
        }
        self.conn.close();
    }
}

fn is_terminal_progress(event: &CdpEvent) -> bool {
    matches!(event.params["state"].as_str(), Some("completed" | "canceled"))
}

/// Pull the value out of a Runtime.evaluate / callFunctionOn reply
fn runtime_value(result: Value) -> DriverResult<Value> {
    if let Some(details) = result.get("exceptionDetails") {
        let text = details["exception"]["description"]
            .as_str()
            .or_else(|| details["text"].as_str())
            .unwrap_or("script threw")
            .to_string();
        return Err(DriverError::Protocol(text));
    }
    Ok(result["result"]["value"].clone())
}

fn not_found_as_missing(err: DriverError) -> DriverError {
    match err {
        DriverError::Protocol(msg) if msg.contains("Could not find node") => {
            DriverError::NoSuchElement
        }
        other => other,
    }
}
