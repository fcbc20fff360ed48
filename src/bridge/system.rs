use crate::components::window::WindowBackend;
use crate::error::WidgetResult;
use crate::service::{platform, WidgetService};
use serde_json::Value;

pub async fn save_settings<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    service.save_ui_settings(&raw).await?;
    Ok(Value::Null)
}

pub async fn load_settings<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    service.load_ui_settings().await
}

pub fn get_platform() -> WidgetResult<Value> {
    Ok(Value::String(platform().to_string()))
}
