use super::autostart::AutoStart;
use super::manager::{WindowBackend, WindowManager};
use super::settings::SizeName;
use crate::error::{window_error, WidgetResult};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const TOOLTIP: &str = "CalDesk - Google Calendar Widget";

/// Opacity steps offered in the menu
pub const OPACITY_STEPS: [f64; 5] = [1.0, 0.95, 0.90, 0.80, 0.70];

/// Something the tray menu (or a tray double-click) asks for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "kebab-case")]
pub enum TrayAction {
    Show,
    Hide,
    ToggleWindow,
    AlwaysOnTop(bool),
    ShowInTaskbar(bool),
    DesktopWidget(bool),
    ToggleAutostart,
    SetSize(SizeName),
    SetOpacity(f64),
    RefreshCalendar,
    Quit,
}

/// What the caller still has to do after a tray action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrayOutcome {
    Handled,
    RefreshCalendar,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MenuItem {
    Normal { label: String, action: TrayAction },
    Checkbox { label: String, checked: bool, action: TrayAction },
    Radio { label: String, checked: bool, action: TrayAction },
    Submenu { label: String, items: Vec<MenuItem> },
    Separator,
}

/// Checked state the menu reflects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrayState {
    pub always_on_top: bool,
    pub show_in_taskbar: bool,
    pub desktop_widget: bool,
    pub autostart: bool,
    pub size: Option<SizeName>,
}

impl TrayState {
    pub fn of<B: WindowBackend>(manager: &WindowManager<B>, autostart: Option<&AutoStart>) -> Self {
        let settings = manager.load_settings();
        Self {
            always_on_top: manager.is_open() && manager.backend().is_always_on_top(),
            show_in_taskbar: settings.show_in_taskbar(),
            desktop_widget: settings.desktop_widget(),
            autostart: autostart.is_some_and(AutoStart::is_enabled),
            size: settings.size,
        }
    }
}

/// Context menu; checkbox actions carry the state a click switches to
pub fn build_menu(state: &TrayState) -> Vec<MenuItem> {
    let sizes = SizeName::PRESETS
        .iter()
        .filter_map(|name| {
            name.preset().map(|preset| MenuItem::Radio {
                label: format!("{} ({}\u{d7}{})", preset.label, preset.width, preset.height),
                checked: state.size == Some(*name),
                action: TrayAction::SetSize(*name),
            })
        })
        .collect();

    let opacities = OPACITY_STEPS
        .iter()
        .map(|opacity| MenuItem::Normal {
            label: format!("{}%", (opacity * 100.0).round() as u32),
            action: TrayAction::SetOpacity(*opacity),
        })
        .collect();

    vec![
        MenuItem::Normal { label: "Show CalDesk".into(), action: TrayAction::Show },
        MenuItem::Normal { label: "Hide CalDesk".into(), action: TrayAction::Hide },
        MenuItem::Separator,
        MenuItem::Checkbox {
            label: "Always on Top".into(),
            checked: state.always_on_top,
            action: TrayAction::AlwaysOnTop(!state.always_on_top),
        },
        MenuItem::Checkbox {
            label: "Show in Taskbar".into(),
            checked: state.show_in_taskbar,
            action: TrayAction::ShowInTaskbar(!state.show_in_taskbar),
        },
        MenuItem::Checkbox {
            label: "Desktop Widget Mode".into(),
            checked: state.desktop_widget,
            action: TrayAction::DesktopWidget(!state.desktop_widget),
        },
        MenuItem::Separator,
        MenuItem::Checkbox {
            label: "Start with System".into(),
            checked: state.autostart,
            action: TrayAction::ToggleAutostart,
        },
        MenuItem::Separator,
        MenuItem::Submenu { label: "Size".into(), items: sizes },
        MenuItem::Submenu { label: "Opacity".into(), items: opacities },
        MenuItem::Separator,
        MenuItem::Normal { label: "Refresh Calendar".into(), action: TrayAction::RefreshCalendar },
        MenuItem::Separator,
        MenuItem::Normal { label: "Quit CalDesk".into(), action: TrayAction::Quit },
    ]
}

/// Apply a tray action to the window manager
pub fn dispatch<B: WindowBackend>(
    action: TrayAction,
    manager: &mut WindowManager<B>,
    autostart: Option<&AutoStart>,
) -> WidgetResult<TrayOutcome> {
    match action {
        TrayAction::Show => manager.show_window(),
        TrayAction::Hide => manager.hide_window(),
        TrayAction::ToggleWindow => manager.toggle_window(),
        TrayAction::AlwaysOnTop(enabled) => manager.toggle_always_on_top(enabled),
        TrayAction::ShowInTaskbar(show) => manager.toggle_taskbar(show),
        TrayAction::DesktopWidget(enabled) => manager.toggle_desktop_widget(enabled),
        TrayAction::ToggleAutostart => {
            let autostart =
                autostart.ok_or_else(|| window_error("Auto start is not available"))?;
            let enabled = autostart.toggle()?;
            info!("Start with system: {}", enabled);
        }
        TrayAction::SetSize(size) => manager.set_size_preset(size)?,
        TrayAction::SetOpacity(opacity) => manager.set_opacity(opacity)?,
        TrayAction::RefreshCalendar => return Ok(TrayOutcome::RefreshCalendar),
        TrayAction::Quit => {
            manager.save_settings();
            return Ok(TrayOutcome::Quit);
        }
    }
    Ok(TrayOutcome::Handled)
}
