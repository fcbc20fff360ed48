mod common;

use caldesk::bridge;
use caldesk::service::{WidgetEvent, WidgetService};
use caldesk::components::window::HeadlessWindow;
use common::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Feed `requests` to a bridge and collect every line it writes back
async fn exchange(service: WidgetService<HeadlessWindow>, requests: &[Value]) -> Vec<Value> {
    let (mut client_in, server_in) = duplex(64 * 1024);
    let (server_out, client_out) = duplex(64 * 1024);

    let bridge = tokio::spawn(bridge::serve(service, BufReader::new(server_in), server_out));

    for request in requests {
        let line = match request {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        client_in.write_all(line.as_bytes()).await.unwrap();
        client_in.write_all(b"\n").await.unwrap();
    }
    drop(client_in);

    let mut lines = BufReader::new(client_out).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        out.push(serde_json::from_str(&line).unwrap());
    }
    bridge.await.unwrap().unwrap();
    out
}

/// A bridge driven one line at a time, for conversations
struct Session {
    input: Option<DuplexStream>,
    output: Lines<BufReader<DuplexStream>>,
    bridge: JoinHandle<caldesk::error::WidgetResult<()>>,
}

impl Session {
    fn start(service: WidgetService<HeadlessWindow>) -> Self {
        let (input, server_in) = duplex(64 * 1024);
        let (server_out, output) = duplex(64 * 1024);
        let bridge = tokio::spawn(bridge::serve(service, BufReader::new(server_in), server_out));
        Self {
            input: Some(input),
            output: BufReader::new(output).lines(),
            bridge,
        }
    }

    async fn send(&mut self, request: Value) {
        let input = self.input.as_mut().unwrap();
        input.write_all(request.to_string().as_bytes()).await.unwrap();
        input.write_all(b"\n").await.unwrap();
    }

    /// Read lines until one matches, returning it
    async fn until(&mut self, wanted: impl Fn(&Value) -> bool) -> Value {
        loop {
            let line = self.output.next_line().await.unwrap().expect("bridge output ended");
            let message: Value = serde_json::from_str(&line).unwrap();
            if wanted(&message) {
                return message;
            }
        }
    }

    async fn event(&mut self, name: &str) -> Value {
        self.until(|m| m["event"] == json!(name)).await
    }

    async fn reply(&mut self, id: i64) -> Value {
        self.until(|m| m.get("ok").is_some() && m["id"] == json!(id)).await
    }

    fn close_input(&mut self) {
        self.input = None;
    }

    async fn finish(mut self) {
        self.close_input();
        while self.output.next_line().await.unwrap().is_some() {}
        self.bridge.await.unwrap().unwrap();
    }
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(server)
        .await;
    mount_user(server).await;
    mount_events(server, "primary", json!([])).await;
}

fn responses(lines: &[Value]) -> HashMap<String, Value> {
    lines
        .iter()
        .filter(|line| line.get("ok").is_some())
        .map(|line| (line["id"].to_string(), line.clone()))
        .collect()
}

#[tokio::test]
async fn answers_simple_requests_by_id() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;

    let lines = exchange(
        widget.service.clone(),
        &[
            json!({"id": 1, "method": "get-platform"}),
            json!({"id": "two", "method": "no-such-method"}),
            json!({"id": 3, "method": "get-size-presets"}),
        ],
    )
    .await;
    let by_id = responses(&lines);

    assert_eq!(by_id["1"]["ok"], json!(true));
    assert!(by_id["1"]["data"].is_string());

    assert_eq!(by_id["\"two\""]["ok"], json!(false));
    assert_eq!(by_id["\"two\""]["error"], json!("Unknown method: no-such-method"));

    let presets = &by_id["3"]["data"];
    assert_eq!(presets["small"]["width"], json!(320));
    assert_eq!(presets["large"]["height"], json!(750));
}

#[tokio::test]
async fn malformed_lines_get_an_error_reply() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;

    let lines = exchange(
        widget.service.clone(),
        &[
            Value::String("not json".into()),
            Value::String(r#"{"id": 7, "params": {}}"#.into()),
        ],
    )
    .await;
    let by_id = responses(&lines);

    assert_eq!(by_id["null"]["ok"], json!(false));
    assert!(by_id["null"]["error"].as_str().unwrap().starts_with("Invalid request"));
    // the id survives even when the method is missing
    assert_eq!(by_id["7"]["ok"], json!(false));
}

#[tokio::test]
async fn calendar_methods_report_signed_out() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;

    let lines = exchange(
        widget.service.clone(),
        &[
            json!({"id": 1, "method": "get-calendars"}),
            json!({"id": 2, "method": "load-stored-auth"}),
        ],
    )
    .await;
    let by_id = responses(&lines);

    assert_eq!(by_id["1"]["ok"], json!(false));
    assert!(by_id["1"]["error"].as_str().unwrap().contains("Not authenticated"));
    assert_eq!(by_id["2"]["ok"], json!(true));
    assert_eq!(by_id["2"]["data"], Value::Null);
}

#[tokio::test]
async fn bad_params_are_reported() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;

    let lines = exchange(
        widget.service.clone(),
        &[
            json!({"id": 1, "method": "set-opacity", "params": {"opacity": "high"}}),
            json!({"id": 2, "method": "set-size-preset", "params": {"size": "huge"}}),
        ],
    )
    .await;
    let by_id = responses(&lines);

    assert!(by_id["1"]["error"].as_str().unwrap().contains("Invalid params"));
    assert!(by_id["2"]["error"].as_str().unwrap().contains("Invalid params"));
}

#[tokio::test]
async fn window_requests_reach_the_window() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;
    widget.service.open_window(false).await;

    let lines = exchange(
        widget.service.clone(),
        &[
            json!({"id": 1, "method": "set-size-preset", "params": {"size": "large"}}),
            json!({"id": 2, "method": "set-opacity", "params": {"opacity": 0.8}}),
            json!({"id": 3, "method": "set-opacity", "params": {"opacity": 1.5}}),
        ],
    )
    .await;
    let by_id = responses(&lines);
    assert_eq!(by_id["1"]["ok"], json!(true));
    assert_eq!(by_id["2"]["ok"], json!(true));
    assert_eq!(by_id["3"]["ok"], json!(false));

    let window = widget.service.window().lock().await;
    assert_eq!(window.backend().bounds.width, 450);
    assert_eq!(window.backend().bounds.height, 750);
    assert_eq!(window.backend().opacity, 0.8);

    let settings = window.load_settings();
    assert_eq!(settings.width(), 450);
}

#[tokio::test]
async fn close_window_only_hides() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;
    widget.service.open_window(false).await;

    exchange(
        widget.service.clone(),
        &[json!({"id": 1, "method": "close-window"})],
    )
    .await;

    let window = widget.service.window().lock().await;
    assert!(window.is_open());
    assert!(!window.backend().visible);
}

#[tokio::test]
async fn ui_settings_round_trip() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;

    let saved = json!({"theme": "dark", "calendars": ["primary", "work"]});
    exchange(
        widget.service.clone(),
        &[json!({"id": 1, "method": "save-settings", "params": saved})],
    )
    .await;

    let lines = exchange(
        widget.service.clone(),
        &[json!({"id": 2, "method": "load-settings"})],
    )
    .await;
    assert_eq!(responses(&lines)["2"]["data"], saved);
}

#[tokio::test]
async fn missing_ui_settings_load_as_null() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;

    let lines = exchange(
        widget.service.clone(),
        &[json!({"id": 1, "method": "load-settings"})],
    )
    .await;
    let by_id = responses(&lines);
    assert_eq!(by_id["1"]["ok"], json!(true));
    assert_eq!(by_id["1"]["data"], Value::Null);
}

#[tokio::test]
async fn tray_quit_is_announced() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;
    widget.service.open_window(true).await;
    let mut events = widget.service.subscribe();

    let lines = exchange(
        widget.service.clone(),
        &[
            json!({"id": 1, "method": "tray-action", "params": {"action": "always-on-top", "value": false}}),
            json!({"id": 2, "method": "tray-action", "params": {"action": "quit"}}),
        ],
    )
    .await;
    let by_id = responses(&lines);

    assert_eq!(by_id["1"]["data"], json!({"outcome": "handled"}));
    assert_eq!(by_id["2"]["data"], json!({"outcome": "quit"}));
    assert!(matches!(events.try_recv(), Ok(WidgetEvent::Quit)));

    let window = widget.service.window().lock().await;
    assert!(!window.backend().always_on_top);
}

#[tokio::test]
async fn tray_menu_lists_window_state() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;
    widget.service.open_window(true).await;

    let lines = exchange(
        widget.service.clone(),
        &[json!({"id": 1, "method": "get-tray-menu"})],
    )
    .await;
    let menu = responses(&lines)["1"]["data"].clone();
    let items = menu.as_array().unwrap();

    let labels: Vec<_> = items.iter().filter_map(|i| i["label"].as_str()).collect();
    assert!(labels.contains(&"Show CalDesk"));
    assert!(labels.contains(&"Quit CalDesk"));
}

#[tokio::test]
async fn every_method_is_routed() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;

    let requests: Vec<Value> = bridge::METHODS
        .iter()
        // these two would wait on the UI or quit
        .filter(|m| !matches!(**m, "google-auth" | "tray-action"))
        .enumerate()
        .map(|(i, m)| json!({"id": i, "method": m}))
        .collect();
    let lines = exchange(widget.service.clone(), &requests).await;

    for line in responses(&lines).values() {
        if let Some(error) = line["error"].as_str() {
            assert!(!error.starts_with("Unknown method"), "{}", error);
        }
    }
}

#[tokio::test]
async fn sign_in_runs_through_page_reports() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    let widget = widget(&server).await;
    let mut session = Session::start(widget.service.clone());

    session.send(json!({"id": 1, "method": "google-auth"})).await;
    let opened = session.event("open-auth-page").await;
    let consent = opened["data"]["url"].as_str().unwrap().to_string();
    assert!(consent.starts_with(&format!("{}/o/oauth2/v2/auth", server.uri())));
    assert!(consent.contains("client_id=client-id"));

    let approval = format!("https://accounts.google.com/o/oauth2/approval/v2?approvalCode={}", CODE);
    session
        .send(json!({"id": 2, "method": "auth-page-event", "params": {"kind": "navigated", "url": approval}}))
        .await;

    session.event("close-auth-page").await;
    let reply = session.reply(1).await;
    assert_eq!(reply["ok"], json!(true), "{}", reply);
    assert_eq!(reply["data"]["user"]["email"], json!("ada@example.com"));
    assert_eq!(reply["data"]["tokens"]["refresh_token"], json!("refresh-1"));

    session.finish().await;
    assert!(widget.store.has_stored_tokens());
}

#[tokio::test]
async fn closing_the_consent_page_fails_sign_in() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;
    let mut session = Session::start(widget.service.clone());

    session.send(json!({"id": 1, "method": "google-auth"})).await;
    session.event("open-auth-page").await;

    session
        .send(json!({"id": 2, "method": "google-auth"}))
        .await;
    let second = session.reply(2).await;
    assert_eq!(second["error"], json!("Authentication error: Authentication already in progress"));

    session
        .send(json!({"id": 3, "method": "auth-page-event", "params": {"kind": "closed"}}))
        .await;
    let reply = session.reply(1).await;
    assert_eq!(reply["ok"], json!(false));
    assert!(reply["error"].as_str().unwrap().contains("Authentication window was closed"));

    // the session is over, so further reports have nowhere to go
    session
        .send(json!({"id": 4, "method": "auth-page-event", "params": {"kind": "closed"}}))
        .await;
    let late = session.reply(4).await;
    assert!(late["error"].as_str().unwrap().contains("No authentication in progress"));

    session.finish().await;
    assert!(!widget.store.has_stored_tokens());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn input_eof_cancels_a_pending_sign_in() {
    let server = MockServer::start().await;
    let widget = widget(&server).await;
    let mut session = Session::start(widget.service.clone());

    session.send(json!({"id": 1, "method": "google-auth"})).await;
    session.event("open-auth-page").await;
    session.close_input();

    let reply = session.reply(1).await;
    assert_eq!(reply["ok"], json!(false));
    assert!(reply["error"].as_str().unwrap().contains("Authentication window was closed"));
    session.finish().await;

    // the cancelled session is gone
    let report = serde_json::from_value(json!({"kind": "closed"})).unwrap();
    assert!(widget.service.report_auth_page(report).await.is_err());
}
