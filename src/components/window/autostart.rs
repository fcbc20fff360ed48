use crate::error::{window_error, WidgetResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Flag passed when the session starts the widget
pub const HIDDEN_FLAG: &str = "--hidden";

const LAUNCH_AGENT_LABEL: &str = "com.caldesk.widget";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    /// freedesktop autostart `.desktop` entry
    Desktop,
    /// launchd LaunchAgent plist
    LaunchAgent,
}

/// Login-item registration for the widget binary
#[derive(Debug, Clone)]
pub struct AutoStart {
    entry: PathBuf,
    exec: PathBuf,
    format: EntryFormat,
}

impl AutoStart {
    pub fn new(entry: PathBuf, exec: PathBuf, format: EntryFormat) -> Self {
        Self { entry, exec, format }
    }

    /// Entry location for this platform, launching the running executable
    pub fn for_current_exe() -> WidgetResult<Self> {
        let exec = std::env::current_exe()?;

        if cfg!(target_os = "macos") {
            let home = dirs::home_dir().ok_or_else(|| window_error("No home directory"))?;
            let entry = home
                .join("Library/LaunchAgents")
                .join(format!("{}.plist", LAUNCH_AGENT_LABEL));
            Ok(Self::new(entry, exec, EntryFormat::LaunchAgent))
        } else if cfg!(unix) {
            let config = dirs::config_dir().ok_or_else(|| window_error("No config directory"))?;
            let entry = config.join("autostart").join("caldesk.desktop");
            Ok(Self::new(entry, exec, EntryFormat::Desktop))
        } else {
            Err(window_error("Auto start is not supported on this platform"))
        }
    }

    pub fn entry_path(&self) -> &Path {
        &self.entry
    }

    fn contents(&self) -> String {
        let exec = self.exec.to_string_lossy();
        match self.format {
            EntryFormat::Desktop => format!(
                "[Desktop Entry]\nType=Application\nName=CalDesk\nComment=Google Calendar desktop widget\nExec=\"{}\" {}\nTerminal=false\nX-GNOME-Autostart-enabled=true\n",
                desktop_quoted(&exec), HIDDEN_FLAG
            ),
            EntryFormat::LaunchAgent => format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
                LAUNCH_AGENT_LABEL,
                xml_escaped(&exec),
                HIDDEN_FLAG
            ),
        }
    }

    pub fn enable(&self) -> WidgetResult<()> {
        if let Some(parent) = self.entry.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.entry, self.contents())?;
        info!("Auto start enabled: {}", self.entry.display());
        Ok(())
    }

    pub fn disable(&self) -> WidgetResult<()> {
        if self.entry.exists() {
            fs::remove_file(&self.entry)?;
            info!("Auto start disabled");
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.entry.exists()
    }

    /// Flip the registration; returns the new state
    pub fn toggle(&self) -> WidgetResult<bool> {
        if self.is_enabled() {
            self.disable()?;
            Ok(false)
        } else {
            self.enable()?;
            Ok(true)
        }
    }
}

/// Body of a double-quoted `Exec=` argument, escaped for the quoting rules
/// and then for the desktop entry string rules
fn desktop_quoted(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len());
    for c in arg.chars() {
        match c {
            '"' | '`' | '$' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '%' => quoted.push_str("%%"),
            _ => quoted.push(c),
        }
    }
    quoted
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

fn xml_escaped(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Whether the process was launched by the session at login
pub fn started_hidden<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().any(|arg| arg.as_ref() == HIDDEN_FLAG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn toggle_writes_and_removes_desktop_entry() {
        let dir = TempDir::new().unwrap();
        let auto = AutoStart::new(
            dir.path().join("autostart/caldesk.desktop"),
            PathBuf::from("/opt/caldesk/caldesk"),
            EntryFormat::Desktop,
        );

        assert!(!auto.is_enabled());
        assert!(auto.toggle().unwrap());
        let entry = fs::read_to_string(auto.entry_path()).unwrap();
        assert!(entry.contains("Exec=\"/opt/caldesk/caldesk\" --hidden"));

        assert!(!auto.toggle().unwrap());
        assert!(!auto.is_enabled());
        auto.disable().unwrap();
    }

    #[test]
    fn launch_agent_runs_hidden() {
        let dir = TempDir::new().unwrap();
        let auto = AutoStart::new(
            dir.path().join("com.caldesk.widget.plist"),
            PathBuf::from("/Applications/CalDesk"),
            EntryFormat::LaunchAgent,
        );
        auto.enable().unwrap();
        let plist = fs::read_to_string(auto.entry_path()).unwrap();
        assert!(plist.contains("<string>--hidden</string>"));
        assert!(plist.contains("<key>RunAtLoad</key>"));
    }

    #[test]
    fn awkward_paths_are_escaped() {
        let dir = TempDir::new().unwrap();
        let exec = PathBuf::from("/opt/Tom & Jerry's <apps>/cal\"desk$1%");

        let desktop = AutoStart::new(dir.path().join("a.desktop"), exec.clone(), EntryFormat::Desktop);
        assert!(desktop.contents().contains(
            "Exec=\"/opt/Tom & Jerry's <apps>/cal\\\\\"desk\\\\$1%%\" --hidden"
        ));

        let agent = AutoStart::new(dir.path().join("a.plist"), exec, EntryFormat::LaunchAgent);
        assert!(agent
            .contents()
            .contains("<string>/opt/Tom &amp; Jerry&apos;s &lt;apps&gt;/cal&quot;desk$1%</string>"));

        assert_eq!(desktop_quoted("C:\\caldesk"), "C:\\\\\\\\caldesk");
    }

    #[test]
    fn hidden_flag_detection() {
        assert!(started_hidden(["caldesk", "--hidden"]));
        assert!(!started_hidden(["caldesk"]));
    }
}
