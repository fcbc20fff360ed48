use super::settings::{size_presets, SettingsFile, SizeName, SizePreset, WindowSettings};
use crate::error::{window_error, WidgetResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Gap kept between the default position and the work area edge
pub const EDGE_MARGIN: i32 = 20;

/// Delay before an unfocused window auto-hides
pub const AUTO_HIDE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Usable area of the primary display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkArea {
    pub width: u32,
    pub height: u32,
}

/// Pixel length as a coordinate, saturating at `i32::MAX`
fn coord(len: u32) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

impl Bounds {
    /// Move inside `area`, shrinking when larger than it
    pub fn clamped_to(self, area: WorkArea) -> Bounds {
        let width = self.width.min(area.width);
        let height = self.height.min(area.height);
        let max_x = coord(area.width).saturating_sub(coord(width));
        let max_y = coord(area.height).saturating_sub(coord(height));

        Bounds {
            x: self.x.clamp(0, max_x.max(0)),
            y: self.y.clamp(0, max_y.max(0)),
            width,
            height,
        }
    }
}

/// How the shell should create the window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub bounds: Bounds,
    pub always_on_top: bool,
    pub skip_taskbar: bool,
    pub opacity: f64,
    /// Pinned to the desktop layer below normal windows
    pub desktop_widget: bool,
}

/// The native window the manager drives
pub trait WindowBackend: Send {
    fn work_area(&self) -> WorkArea;
    fn create(&mut self, options: &WindowOptions);
    fn destroy(&mut self);
    fn bounds(&self) -> Bounds;
    fn set_bounds(&mut self, bounds: Bounds);
    fn show(&mut self);
    fn hide(&mut self);
    fn focus(&mut self);
    fn minimize(&mut self);
    fn is_visible(&self) -> bool;
    fn is_focused(&self) -> bool;
    /// Record a focus change reported by the shell
    fn set_focused(&mut self, focused: bool);
    fn set_always_on_top(&mut self, enabled: bool);
    fn is_always_on_top(&self) -> bool;
    fn set_skip_taskbar(&mut self, skip: bool);
    fn set_opacity(&mut self, opacity: f64);
    fn opacity(&self) -> f64;
}

/// Window state without a display, for the bridge process and tests
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    pub area: WorkArea,
    pub options: Option<WindowOptions>,
    pub bounds: Bounds,
    pub visible: bool,
    pub focused: bool,
    pub minimized: bool,
    pub always_on_top: bool,
    pub skip_taskbar: bool,
    pub opacity: f64,
}

impl HeadlessWindow {
    pub fn new(area: WorkArea) -> Self {
        Self {
            area,
            options: None,
            bounds: Bounds { x: 0, y: 0, width: 0, height: 0 },
            visible: false,
            focused: false,
            minimized: false,
            always_on_top: false,
            skip_taskbar: false,
            opacity: 1.0,
        }
    }
}

impl Default for HeadlessWindow {
    fn default() -> Self {
        Self::new(WorkArea { width: 1920, height: 1080 })
    }
}

impl WindowBackend for HeadlessWindow {
    fn work_area(&self) -> WorkArea {
        self.area
    }

    fn create(&mut self, options: &WindowOptions) {
        self.bounds = options.bounds;
        self.always_on_top = options.always_on_top;
        self.skip_taskbar = options.skip_taskbar;
        self.opacity = options.opacity;
        self.visible = false;
        self.focused = false;
        self.options = Some(options.clone());
    }

    fn destroy(&mut self) {
        self.options = None;
        self.visible = false;
        self.focused = false;
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    fn show(&mut self) {
        self.visible = true;
        self.minimized = false;
    }

    fn hide(&mut self) {
        self.visible = false;
        self.focused = false;
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn minimize(&mut self) {
        self.minimized = true;
        self.focused = false;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn set_always_on_top(&mut self, enabled: bool) {
        self.always_on_top = enabled;
    }

    fn is_always_on_top(&self) -> bool {
        self.always_on_top
    }

    fn set_skip_taskbar(&mut self, skip: bool) {
        self.skip_taskbar = skip;
    }

    fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity;
    }

    fn opacity(&self) -> f64 {
        self.opacity
    }
}

/// Owns the widget window and keeps its settings file in step with it.
/// Operations on a window that does not exist are ignored.
pub struct WindowManager<B: WindowBackend> {
    backend: B,
    settings: SettingsFile,
    open: bool,
}

pub type SharedWindowManager<B> = Arc<Mutex<WindowManager<B>>>;

impl<B: WindowBackend> WindowManager<B> {
    pub fn new(backend: B, data_dir: &Path) -> Self {
        Self {
            backend,
            settings: SettingsFile::new(data_dir),
            open: false,
        }
    }

    pub fn into_shared(self) -> SharedWindowManager<B> {
        Arc::new(Mutex::new(self))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn load_settings(&self) -> WindowSettings {
        self.settings.load()
    }

    /// Options for a new window from the stored settings
    pub fn window_options(&self) -> WindowOptions {
        let settings = self.load_settings();
        let area = self.backend.work_area();
        let width = settings.width();
        let height = settings.height();

        let default_x = coord(area.width)
            .saturating_sub(coord(width))
            .saturating_sub(EDGE_MARGIN);
        let mut options = WindowOptions {
            bounds: Bounds {
                x: settings.x.unwrap_or(default_x),
                y: settings.y.unwrap_or(EDGE_MARGIN),
                width,
                height,
            },
            always_on_top: settings.always_on_top(),
            skip_taskbar: !settings.show_in_taskbar(),
            opacity: settings.opacity(),
            desktop_widget: settings.desktop_widget(),
        };

        if options.desktop_widget {
            options.always_on_top = false;
            options.skip_taskbar = true;
        }
        options
    }

    /// Create the window hidden; callers show it when ready
    pub fn create_window(&mut self) {
        let options = self.window_options();
        debug!("Creating window at {:?}", options.bounds);
        self.backend.create(&options);
        self.open = true;
    }

    /// Write current bounds, always-on-top and opacity, preserving the rest
    pub fn save_settings(&self) {
        if !self.open {
            return;
        }
        let bounds = self.backend.bounds();
        let always_on_top = self.backend.is_always_on_top();
        let opacity = self.backend.opacity();

        self.settings.update(|settings| {
            settings.x = Some(bounds.x);
            settings.y = Some(bounds.y);
            settings.width = Some(bounds.width);
            settings.height = Some(bounds.height);
            settings.always_on_top = Some(always_on_top);
            settings.opacity = Some(opacity);
        });
    }

    pub fn toggle_window(&mut self) {
        if !self.open {
            return;
        }
        if self.backend.is_visible() {
            self.hide_window();
        } else {
            self.show_window();
        }
    }

    /// Bring the window back into the work area, then show and focus it
    pub fn show_window(&mut self) {
        if !self.open {
            return;
        }
        let area = self.backend.work_area();
        let clamped = self.backend.bounds().clamped_to(area);
        self.backend.set_bounds(clamped);
        self.backend.show();
        self.backend.focus();
    }

    pub fn hide_window(&mut self) {
        if self.open {
            self.backend.hide();
        }
    }

    pub fn minimize_window(&mut self) {
        if self.open {
            self.backend.minimize();
        }
    }

    pub fn toggle_always_on_top(&mut self, enabled: bool) {
        if !self.open {
            return;
        }
        self.backend.set_always_on_top(enabled);
        self.save_settings();
    }

    pub fn toggle_taskbar(&mut self, show_in_taskbar: bool) {
        if !self.open {
            return;
        }
        self.backend.set_skip_taskbar(!show_in_taskbar);
        self.settings
            .update(|settings| settings.show_in_taskbar = Some(show_in_taskbar));
        self.save_settings();
    }

    pub fn set_opacity(&mut self, opacity: f64) -> WidgetResult<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(window_error(&format!(
                "Opacity must be between 0 and 1, got {}",
                opacity
            )));
        }
        if !self.open {
            return Ok(());
        }
        self.backend.set_opacity(opacity);
        self.save_settings();
        Ok(())
    }

    pub fn set_auto_hide(&mut self, enabled: bool) {
        self.settings.update(|settings| settings.auto_hide = Some(enabled));
    }

    /// Persist the mode, then rebuild the window in place
    pub fn toggle_desktop_widget(&mut self, enabled: bool) {
        self.settings
            .update(|settings| settings.desktop_widget = Some(enabled));

        let previous = self.open.then(|| self.backend.bounds());
        if self.open {
            self.backend.destroy();
        }

        self.create_window();
        if let Some(bounds) = previous {
            self.backend.set_bounds(bounds);
        }
        self.show_window();
        info!("Desktop widget mode {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn set_size_preset(&mut self, size: SizeName) -> WidgetResult<()> {
        let preset = size
            .preset()
            .ok_or_else(|| window_error("Custom size needs explicit dimensions"))?;
        if !self.open {
            return Ok(());
        }
        self.resize(preset.width, preset.height, size);
        Ok(())
    }

    pub fn set_custom_size(&mut self, width: u32, height: u32) -> WidgetResult<()> {
        if width == 0 || height == 0 {
            return Err(window_error("Window size must be positive"));
        }
        if !self.open {
            return Ok(());
        }
        self.resize(width, height, SizeName::Custom);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32, size: SizeName) {
        let current = self.backend.bounds();
        self.backend.set_bounds(Bounds {
            width,
            height,
            ..current
        });
        self.settings.update(|settings| {
            settings.size = Some(size);
            settings.width = Some(width);
            settings.height = Some(height);
        });
    }

    pub fn get_size_presets(&self) -> BTreeMap<SizeName, SizePreset> {
        size_presets()
    }

    /// Bounds or focus changed on the shell side
    pub fn report_bounds(&mut self, bounds: Bounds) {
        if self.open {
            self.backend.set_bounds(bounds);
        }
    }

    pub fn report_focus(&mut self, focused: bool) {
        if self.open {
            self.backend.set_focused(focused);
        }
    }

    pub fn on_moved(&mut self) {
        self.save_settings();
    }

    pub fn on_resized(&mut self) {
        self.save_settings();
    }

    /// Closing only hides the widget
    pub fn on_close_requested(&mut self) {
        self.hide_window();
    }

    /// True when a blur should start the auto-hide countdown
    pub fn should_auto_hide(&self) -> bool {
        self.open && self.load_settings().auto_hide()
    }

    /// Hide unless the window got focus back during the countdown
    pub fn hide_if_unfocused(&mut self) -> bool {
        if self.open && !self.backend.is_focused() {
            self.hide_window();
            return true;
        }
        false
    }

    pub fn destroy(&mut self) {
        self.save_settings();
        if self.open {
            self.backend.destroy();
            self.open = false;
        }
    }
}

/// Start the auto-hide countdown after the window lost focus
pub async fn on_blur<B: WindowBackend + 'static>(manager: &SharedWindowManager<B>) {
    if !manager.lock().await.should_auto_hide() {
        return;
    }

    let manager = Arc::clone(manager);
    tokio::spawn(async move {
        tokio::time::sleep(AUTO_HIDE_DELAY).await;
        if manager.lock().await.hide_if_unfocused() {
            debug!("Window auto-hidden after losing focus");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> WindowManager<HeadlessWindow> {
        WindowManager::new(HeadlessWindow::default(), dir.path())
    }

    #[test]
    fn new_window_defaults_to_top_right() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();

        let options = wm.backend().options.clone().unwrap();
        assert_eq!(options.bounds, Bounds { x: 1920 - 380 - 20, y: 20, width: 380, height: 600 });
        assert!(options.desktop_widget);
        assert!(!options.always_on_top);
        assert!(options.skip_taskbar);
        assert!(!wm.backend().visible);
    }

    #[test]
    fn desktop_widget_mode_overrides_always_on_top() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path());
        file.update(|s| {
            s.always_on_top = Some(true);
            s.show_in_taskbar = Some(true);
        });

        let wm = manager(&dir);
        let options = wm.window_options();
        assert!(!options.always_on_top);
        assert!(options.skip_taskbar);

        file.update(|s| s.desktop_widget = Some(false));
        let options = wm.window_options();
        assert!(options.always_on_top);
        assert!(!options.skip_taskbar);
    }

    #[test]
    fn show_clamps_into_work_area() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();
        wm.backend.set_bounds(Bounds { x: 1800, y: -40, width: 380, height: 2000 });

        wm.show_window();
        assert_eq!(wm.backend().bounds, Bounds { x: 1540, y: 0, width: 380, height: 1080 });
        assert!(wm.backend().visible && wm.backend().focused);

        wm.toggle_window();
        assert!(!wm.backend().visible);
    }

    #[test]
    fn extreme_reported_bounds_are_clamped() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();
        wm.report_bounds(Bounds { x: i32::MAX - 10, y: i32::MIN, width: 380, height: 600 });

        wm.show_window();
        assert_eq!(wm.backend().bounds, Bounds { x: 1540, y: 0, width: 380, height: 600 });

        wm.report_bounds(Bounds { x: i32::MAX, y: i32::MAX, width: u32::MAX, height: u32::MAX });
        wm.show_window();
        assert_eq!(wm.backend().bounds, Bounds { x: 0, y: 0, width: 1920, height: 1080 });
    }

    #[test]
    fn oversized_stored_width_does_not_overflow_default_position() {
        let dir = TempDir::new().unwrap();
        SettingsFile::new(dir.path()).update(|s| s.width = Some(u32::MAX));

        let options = manager(&dir).window_options();
        assert_eq!(options.bounds.x, 1920 - i32::MAX - EDGE_MARGIN);
    }

    #[test]
    fn size_changes_are_persisted() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();

        wm.set_size_preset(SizeName::Large).unwrap();
        assert_eq!(wm.backend().bounds.width, 450);
        assert_eq!(wm.load_settings().size, Some(SizeName::Large));

        wm.set_custom_size(500, 520).unwrap();
        let settings = wm.load_settings();
        assert_eq!(settings.size, Some(SizeName::Custom));
        assert_eq!((settings.width(), settings.height()), (500, 520));

        assert!(wm.set_size_preset(SizeName::Custom).is_err());
        assert!(wm.set_custom_size(0, 10).is_err());
    }

    #[test]
    fn save_preserves_mode_and_size() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();
        wm.set_size_preset(SizeName::Small).unwrap();
        wm.set_opacity(0.8).unwrap();
        wm.on_moved();

        let settings = wm.load_settings();
        assert_eq!(settings.opacity(), 0.8);
        assert_eq!(settings.size, Some(SizeName::Small));
        assert!(settings.desktop_widget());
        assert_eq!(settings.x, Some(1920 - 380 - 20));
        assert!(wm.set_opacity(1.5).is_err());
    }

    #[test]
    fn toggling_desktop_widget_recreates_with_same_bounds() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();
        let moved = Bounds { x: 100, y: 200, width: 380, height: 600 };
        wm.backend.set_bounds(moved);

        wm.toggle_desktop_widget(false);
        assert!(!wm.backend().options.as_ref().unwrap().desktop_widget);
        assert_eq!(wm.backend().bounds, moved);
        assert!(!wm.load_settings().desktop_widget());
        assert!(wm.backend().visible);
    }

    #[test]
    fn close_request_hides_instead() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();
        wm.show_window();
        wm.on_close_requested();
        assert!(wm.is_open());
        assert!(!wm.backend().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn blur_auto_hides_only_when_enabled_and_unfocused() {
        let dir = TempDir::new().unwrap();
        let mut wm = manager(&dir);
        wm.create_window();
        wm.show_window();
        wm.backend.focused = false;
        let shared = wm.into_shared();

        on_blur(&shared).await;
        tokio::time::sleep(AUTO_HIDE_DELAY * 2).await;
        assert!(shared.lock().await.backend().visible);

        shared.lock().await.set_auto_hide(true);
        on_blur(&shared).await;
        tokio::time::sleep(AUTO_HIDE_DELAY * 2).await;
        assert!(!shared.lock().await.backend().visible);
    }
}
