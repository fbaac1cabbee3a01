use drivecrawl::core::browser::{
    ChromeDriver, DriverError, ElementHandle, PageDriver, WaitUntil,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::fs;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn download_begin(guid: &str, frame: &str, name: &str) -> Value {
    json!({
        "method": "Browser.downloadWillBegin",
        "params": { "guid": guid, "frameId": frame, "suggestedFilename": name, "url": "https://drive.test/dl" }
    })
}

fn download_done(guid: &str) -> Value {
    json!({
        "method": "Browser.downloadProgress",
        "params": { "guid": guid, "state": "completed" }
    })
}

/// Serve one DevTools connection; `events` yields what to push before a reply
fn spawn_browser<F>(mut events: F) -> String
where
    F: FnMut(&str, Option<&str>, u32) -> Vec<Value> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut targets = 0;

            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let request: Value = serde_json::from_str(&text).unwrap();
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let session = request["sessionId"].as_str().map(str::to_string);

                let result = match method.as_str() {
                    "Target.createTarget" => {
                        targets += 1;
                        json!({ "targetId": format!("T{}", targets) })
                    }
                    "Target.attachToTarget" => json!({ "sessionId": format!("S{}", targets) }),
                    "DOM.resolveNode" => json!({ "object": { "objectId": "obj-1" } }),
                    "Runtime.callFunctionOn" => json!({ "result": { "type": "boolean", "value": true } }),
                    _ => json!({}),
                };

                let mut outgoing = events(&method, session.as_deref(), targets);
                outgoing.push(json!({ "id": request["id"], "result": result, "sessionId": session }));
                if method == "Page.navigate" {
                    outgoing.push(json!({ "method": "Page.domContentEventFired", "params": {}, "sessionId": session }));
                }

                for message in outgoing {
                    if ws.send(Message::Text(message.to_string().into())).await.is_err() {
                        return;
                    }
                }
            }
        });
    });

    format!("ws://{}", addr)
}

#[test]
fn test_download_from_closed_page_is_not_handed_to_the_next_one() {
    let ws_url = spawn_browser(|method, session, _| match (method, session) {
        // The first page's download only shows up while it is navigating
        ("Page.navigate", Some("S1")) => vec![
            download_begin("g-old", "T1", "previous.pdf"),
            download_done("g-old"),
        ],
        _ => Vec::new(),
    });

    let staging = TempDir::new().unwrap();
    let mut driver = ChromeDriver::connect(&ws_url, staging.path()).unwrap();

    let first = driver.open_page().unwrap();
    driver
        .navigate(&first, "https://drive.test/arquivo/1", WaitUntil::DomContentLoaded, WAIT)
        .unwrap();
    fs::write(staging.path().join("g-old"), b"previous").unwrap();
    driver.close_page(&first).unwrap();

    assert!(
        !staging.path().join("g-old").exists(),
        "the orphaned staged file is removed"
    );

    let second = driver.open_page().unwrap();
    driver
        .navigate(&second, "https://drive.test/arquivo/2", WaitUntil::DomContentLoaded, WAIT)
        .unwrap();

    let result = driver.await_download(&second, Duration::from_millis(500));
    assert!(
        matches!(result, Err(DriverError::Timeout(..))),
        "got {:?}",
        result
    );
}

#[test]
fn test_click_only_waits_for_its_own_download() {
    let ws_url = spawn_browser(|method, _, _| match method {
        // A late download from the closed first page lands right before ours
        "Runtime.callFunctionOn" => vec![
            download_begin("g-late", "T1", "previous.pdf"),
            download_done("g-late"),
            download_begin("g-new", "T2", "lista.pdf"),
            download_done("g-new"),
        ],
        _ => Vec::new(),
    });

    let staging = TempDir::new().unwrap();
    let mut driver = ChromeDriver::connect(&ws_url, staging.path()).unwrap();

    let first = driver.open_page().unwrap();
    driver.close_page(&first).unwrap();

    let second = driver.open_page().unwrap();
    driver
        .navigate(&second, "https://drive.test/arquivo/2", WaitUntil::DomContentLoaded, WAIT)
        .unwrap();
    driver.click(&second, ElementHandle(7)).unwrap();

    let download = driver.await_download(&second, WAIT).unwrap();
    assert_eq!(download.id, "g-new");
    assert_eq!(download.suggested_filename, "lista.pdf");
}

#[test]
fn test_leftover_download_is_dropped_before_click() {
    let ws_url = spawn_browser(|method, session, _| match (method, session) {
        // No frame id: only the sweep before the click can tell it apart
        ("Page.navigate", Some("S1")) => vec![
            json!({ "method": "Browser.downloadWillBegin", "params": { "guid": "g-old", "suggestedFilename": "previous.pdf" } }),
        ],
        ("Runtime.callFunctionOn", _) => vec![
            download_begin("g-new", "T1", "lista.pdf"),
            download_done("g-new"),
        ],
        _ => Vec::new(),
    });

    let staging = TempDir::new().unwrap();
    let mut driver = ChromeDriver::connect(&ws_url, staging.path()).unwrap();

    let page = driver.open_page().unwrap();
    driver
        .navigate(&page, "https://drive.test/arquivo/1", WaitUntil::DomContentLoaded, WAIT)
        .unwrap();
    driver.click(&page, ElementHandle(3)).unwrap();

    let download = driver.await_download(&page, WAIT).unwrap();
    assert_eq!(download.id, "g-new");
}
