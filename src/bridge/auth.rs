use super::protocol::params;
use crate::components::google_auth::PageReport;
use crate::components::window::WindowBackend;
use crate::error::WidgetResult;
use crate::service::WidgetService;
use serde_json::{json, Value};
use tracing::info;

pub async fn google_auth<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    info!("Starting Google sign-in");
    let auth = service.google_auth().await?;
    Ok(serde_json::to_value(auth)?)
}

pub async fn auth_page_event<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let report: PageReport = params(raw)?;
    service.report_auth_page(report).await?;
    Ok(Value::Null)
}

/// Stored session or `null`
pub async fn load_stored_auth<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    match service.load_stored_auth().await {
        Some(auth) => Ok(serde_json::to_value(auth)?),
        None => Ok(Value::Null),
    }
}

pub async fn logout<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    service.logout().await?;
    Ok(json!({ "success": true }))
}
