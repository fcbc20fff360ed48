pub mod autostart;
pub mod manager;
pub mod settings;
pub mod tray;

pub use autostart::{started_hidden, AutoStart, HIDDEN_FLAG};
pub use manager::{
    on_blur, Bounds, HeadlessWindow, SharedWindowManager, WindowBackend, WindowManager,
    WindowOptions, WorkArea,
};
pub use settings::{size_presets, SizeName, SizePreset, WindowSettings};
pub use tray::{build_menu, dispatch, MenuItem, TrayAction, TrayOutcome, TrayState};
