//! Line-delimited JSON surface between the UI process and the widget
//! service. Each line in is a request, each line out is a response or a
//! pushed event.

pub mod auth;
pub mod calendar;
pub mod protocol;
pub mod system;
pub mod window;

use crate::components::window::WindowBackend;
use crate::error::{other_error, WidgetResult};
use crate::service::{WidgetEvent, WidgetService};
use protocol::{encode, parse_request, Outgoing, Response};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long in-flight requests may run after the input closes
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Every method the bridge answers
pub const METHODS: &[&str] = &[
    "google-auth",
    "auth-page-event",
    "load-stored-auth",
    "logout",
    "get-calendars",
    "get-events",
    "get-todays-events",
    "get-upcoming-events",
    "create-event",
    "update-event",
    "delete-event",
    "get-month",
    "schedule-notifications",
    "show-notification",
    "minimize-window",
    "close-window",
    "toggle-window",
    "set-opacity",
    "set-size-preset",
    "set-custom-size",
    "get-size-presets",
    "window-event",
    "save-settings",
    "load-settings",
    "get-platform",
    "tray-action",
    "get-tray-menu",
];

/// Route one request to its handler
pub async fn dispatch<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    method: &str,
    params: Value,
) -> WidgetResult<Value> {
    match method {
        "google-auth" => auth::google_auth(service).await,
        "auth-page-event" => auth::auth_page_event(service, params).await,
        "load-stored-auth" => auth::load_stored_auth(service).await,
        "logout" => auth::logout(service).await,

        "get-calendars" => calendar::get_calendars(service).await,
        "get-events" => calendar::get_events(service, params).await,
        "get-todays-events" => calendar::get_todays_events(service, params).await,
        "get-upcoming-events" => calendar::get_upcoming_events(service, params).await,
        "create-event" => calendar::create_event(service, params).await,
        "update-event" => calendar::update_event(service, params).await,
        "delete-event" => calendar::delete_event(service, params).await,
        "get-month" => calendar::get_month(service, params).await,
        "schedule-notifications" => calendar::schedule_notifications(service, params),
        "show-notification" => calendar::show_notification(service, params),

        "minimize-window" => window::minimize(service).await,
        "close-window" => window::close(service).await,
        "toggle-window" => window::toggle(service).await,
        "set-opacity" => window::set_opacity(service, params).await,
        "set-size-preset" => window::set_size_preset(service, params).await,
        "set-custom-size" => window::set_custom_size(service, params).await,
        "get-size-presets" => window::get_size_presets(service).await,
        "window-event" => window::window_event(service, params).await,
        "tray-action" => window::tray_action(service, params).await,
        "get-tray-menu" => window::tray_menu(service).await,

        "save-settings" => system::save_settings(service, params).await,
        "load-settings" => system::load_settings(service).await,
        "get-platform" => system::get_platform(),

        other => Err(other_error(&format!("Unknown method: {}", other))),
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(mut writer: W, mut outgoing: mpsc::Receiver<Outgoing>) {
    while let Some(message) = outgoing.recv().await {
        let line = match encode(&message) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode bridge message: {}", e);
                continue;
            }
        };

        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            error!("Bridge output closed: {}", e);
            break;
        }
    }
}

async fn forward_events(
    mut events: broadcast::Receiver<WidgetEvent>,
    outgoing: mpsc::Sender<Outgoing>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if outgoing.send(Outgoing::Event(event)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Bridge dropped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Serve requests from `reader` until it hits EOF. Requests run
/// concurrently so a pending sign-in does not block its page events.
pub async fn serve<B, R, W>(service: WidgetService<B>, reader: R, writer: W) -> WidgetResult<()>
where
    B: WindowBackend + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Outgoing>(64);
    let writer_task = tokio::spawn(write_loop(writer, rx));
    let events_task = tokio::spawn(forward_events(service.subscribe(), tx.clone()));
    let mut requests = JoinSet::new();

    info!("Bridge listening");
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request = match parse_request(line) {
            Ok(request) => request,
            Err(response) => {
                warn!("Rejected bridge line: {:?}", response.error);
                let _ = tx.send(Outgoing::Response(response)).await;
                continue;
            }
        };

        debug!("Bridge request {} {}", request.id, request.method);
        let service = service.clone();
        let tx = tx.clone();
        requests.spawn(async move {
            let response = match dispatch(&service, &request.method, request.params).await {
                Ok(data) => Response::success(request.id, data),
                Err(e) => {
                    warn!("Bridge method {} failed: {}", request.method, e);
                    Response::failure(request.id, &e)
                }
            };
            let _ = tx.send(Outgoing::Response(response)).await;
        });

        // reap finished requests
        while requests.try_join_next().is_some() {}
    }

    info!("Bridge input closed");
    // a sign-in waiting on page events can never finish now
    service.cancel_auth().await;
    let drain = async { while requests.join_next().await.is_some() {} };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        warn!("Abandoning {} unfinished bridge requests", requests.len());
        requests.shutdown().await;
    }
    events_task.abort();
    drop(tx);
    writer_task
        .await
        .map_err(|e| other_error(&format!("Bridge writer task failed: {}", e)))?;
    Ok(())
}
