use super::protocol::params;
use crate::components::window::{Bounds, SizeName, TrayAction, WindowBackend};
use crate::error::WidgetResult;
use crate::service::{WidgetService, WindowEventKind};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct OpacityParams {
    opacity: f64,
}

#[derive(Debug, Deserialize)]
struct PresetParams {
    size: SizeName,
}

#[derive(Debug, Deserialize)]
struct CustomSizeParams {
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct WindowEventParams {
    kind: WindowEventKind,
    #[serde(default)]
    bounds: Option<Bounds>,
}

pub async fn minimize<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    service.window().lock().await.minimize_window();
    Ok(Value::Null)
}

/// The widget never closes from the UI; it hides
pub async fn close<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    service.window().lock().await.on_close_requested();
    Ok(Value::Null)
}

pub async fn toggle<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    service.window().lock().await.toggle_window();
    Ok(Value::Null)
}

pub async fn set_opacity<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: OpacityParams = params(raw)?;
    service.window().lock().await.set_opacity(p.opacity)?;
    Ok(Value::Null)
}

pub async fn set_size_preset<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: PresetParams = params(raw)?;
    service.window().lock().await.set_size_preset(p.size)?;
    Ok(Value::Null)
}

pub async fn set_custom_size<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: CustomSizeParams = params(raw)?;
    service
        .window()
        .lock()
        .await
        .set_custom_size(p.width, p.height)?;
    Ok(Value::Null)
}

pub async fn get_size_presets<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    let presets = service.window().lock().await.get_size_presets();
    Ok(serde_json::to_value(presets)?)
}

pub async fn window_event<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let p: WindowEventParams = params(raw)?;
    service.window_event(p.kind, p.bounds).await;
    Ok(Value::Null)
}

pub async fn tray_action<B: WindowBackend + 'static>(
    service: &WidgetService<B>,
    raw: Value,
) -> WidgetResult<Value> {
    let action: TrayAction = params(raw)?;
    let outcome = service.tray_action(action).await?;
    Ok(json!({ "outcome": outcome }))
}

pub async fn tray_menu<B: WindowBackend + 'static>(service: &WidgetService<B>) -> WidgetResult<Value> {
    Ok(serde_json::to_value(service.tray_menu().await)?)
}
