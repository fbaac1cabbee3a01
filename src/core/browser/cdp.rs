// Chrome DevTools Protocol transport
// One WebSocket to the browser endpoint; pages are addressed through
// flattened target sessions (`sessionId` on every message).

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::{DriverError, DriverResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Only events from these domains are kept for later `wait_for_event` calls
const BUFFERED_DOMAINS: &[&str] = &["Page.", "Browser.", "Target."];
const MAX_BUFFERED_EVENTS: usize = 256;

/// CDP request structure
#[derive(Debug, Serialize)]
struct CdpRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

/// Anything the browser sends: a reply (has `id`) or an event (has `method`)
#[derive(Debug, Deserialize)]
struct CdpMessage {
    id: Option<u64>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
    result: Option<Value>,
    error: Option<CdpErrorBody>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// CDP error structure
#[derive(Debug, Deserialize)]
struct CdpErrorBody {
    message: String,
}

/// An event pushed by the browser
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Blocking CDP client
///
/// Owns a current-thread Tokio runtime and blocks on every round trip, so the
/// crawl worker stays a plain sequential thread.
pub struct CdpConnection {
    runtime: tokio::runtime::Runtime,
    ws: WsStream,
    next_id: u64,
    events: VecDeque<CdpEvent>,
}

impl CdpConnection {
    /// Connect to a `webSocketDebuggerUrl`
    pub fn connect(ws_url: &str) -> DriverResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (ws, _) = runtime
            .block_on(connect_async(ws_url))
            .map_err(|e| DriverError::Connection(format!("{}: {}", ws_url, e)))?;

        log::debug!("CDP connected to {}", ws_url);

        Ok(Self {
            runtime,
            ws,
            next_id: 1,
            events: VecDeque::new(),
        })
    }

    /// Send a command and wait for its reply
    pub fn call(
        &mut self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> DriverResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = CdpRequest {
            id,
            method,
            params,
            session_id,
        };
        let payload =
            serde_json::to_string(&request).map_err(|e| DriverError::Protocol(e.to_string()))?;
        log::debug!("CDP -> #{} {}", id, method);

        let Self {
            runtime, ws, events, ..
        } = self;

        runtime.block_on(async {
            ws.send(Message::Text(payload.into()))
                .await
                .map_err(|e| DriverError::Connection(e.to_string()))?;

            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let message = tokio::time::timeout_at(deadline, read_message(ws))
                    .await
                    .map_err(|_| DriverError::Timeout(timeout, method.to_string()))??;

                match message.id {
                    Some(reply_id) if reply_id == id => {
                        if let Some(error) = message.error {
                            return Err(DriverError::Protocol(format!(
                                "{}: {}",
                                method, error.message
                            )));
                        }
                        return Ok(message.result.unwrap_or(Value::Null));
                    }
                    // Late reply to a command that already timed out
                    Some(_) => continue,
                    None => buffer_event(events, message),
                }
            }
        })
    }

    /// Wait until an event matching `predicate` arrives (buffered ones first)
    pub fn wait_for_event<F>(
        &mut self,
        what: &str,
        timeout: Duration,
        mut predicate: F,
    ) -> DriverResult<CdpEvent>
    where
        F: FnMut(&CdpEvent) -> bool,
    {
        if let Some(pos) = self.events.iter().position(&mut predicate) {
            if let Some(event) = self.events.remove(pos) {
                return Ok(event);
            }
        }

        let Self {
            runtime, ws, events, ..
        } = self;

        runtime.block_on(async {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let message = tokio::time::timeout_at(deadline, read_message(ws))
                    .await
                    .map_err(|_| DriverError::Timeout(timeout, what.to_string()))??;

                if message.id.is_some() {
                    continue;
                }
                let Some(event) = into_event(message) else {
                    continue;
                };
                if predicate(&event) {
                    return Ok(event);
                }
                push_bounded(events, event);
            }
        })
    }

    /// Drop buffered events matching `predicate`
    pub fn discard_events<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&CdpEvent) -> bool,
    {
        self.events.retain(|e| !predicate(e));
    }

    /// Send a close frame; errors are ignored since the peer may be gone
    pub fn close(&mut self) {
        let Self { runtime, ws, .. } = self;
        let _ = runtime.block_on(ws.close(None));
    }
}

async fn read_message(ws: &mut WsStream) -> DriverResult<CdpMessage> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text)
                    .map_err(|e| DriverError::Protocol(format!("invalid CDP message: {}", e)));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(DriverError::Connection("browser closed the connection".into()));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(DriverError::Connection(e.to_string())),
        }
    }
}

fn into_event(message: CdpMessage) -> Option<CdpEvent> {
    message.method.map(|method| CdpEvent {
        method,
        params: message.params,
        session_id: message.session_id,
    })
}

fn buffer_event(events: &mut VecDeque<CdpEvent>, message: CdpMessage) {
    if let Some(event) = into_event(message) {
        push_bounded(events, event);
    }
}

fn push_bounded(events: &mut VecDeque<CdpEvent>, event: CdpEvent) {
    if !BUFFERED_DOMAINS.iter().any(|d| event.method.starts_with(d)) {
        return;
    }
    if events.len() >= MAX_BUFFERED_EVENTS {
        events.pop_front();
    }
    events.push_back(event);
}
