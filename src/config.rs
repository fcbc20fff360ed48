use crate::error::{config_error, env_error, WidgetResult};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Redirect URI for the out-of-band consent flow (no local listener)
pub const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Default interval between calendar refreshes, in seconds
pub const DEFAULT_REFRESH_INTERVAL: u64 = 300;

/// Default look-ahead for upcoming events, in days
pub const DEFAULT_UPCOMING_DAYS: i64 = 7;

/// Optional file with non-secret overrides
pub const CONFIG_FILE: &str = "config/caldesk.toml";

/// Main configuration structure for the widget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google OAuth client ID
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// OAuth redirect URI
    pub redirect_uri: String,
    /// Directory holding tokens and window settings
    pub data_dir: PathBuf,
    /// Calendars shown in the widget
    pub calendar_ids: Vec<String>,
    /// Seconds between automatic refreshes of today's events
    pub refresh_interval: u64,
    /// Whether reminder notifications are armed
    pub notifications_enabled: bool,
    /// Days covered by the upcoming events view
    pub upcoming_days: i64,
}

/// Fields that may be overridden from the config file
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    redirect_uri: Option<String>,
    data_dir: Option<PathBuf>,
    calendar_ids: Option<Vec<String>>,
    refresh_interval: Option<u64>,
    notifications_enabled: Option<bool>,
    upcoming_days: Option<i64>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> WidgetResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let google_client_id = env::var("GOOGLE_CLIENT_ID").unwrap_or_default();
        let google_client_secret = env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default();
        if google_client_id.is_empty() || google_client_secret.is_empty() {
            return Err(env_error(
                "Google OAuth credentials not configured. Please set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET environment variables.",
            ));
        }

        let redirect_uri =
            env::var("GOOGLE_REDIRECT_URI").unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string());

        let data_dir = match env::var("CALDESK_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_data_dir(),
        };

        let calendar_ids = env::var("CALDESK_CALENDAR_IDS")
            .map(|ids| parse_calendar_ids(&ids))
            .unwrap_or_else(|_| vec!["primary".to_string()]);

        let refresh_interval = numeric_var("CALDESK_REFRESH_INTERVAL", DEFAULT_REFRESH_INTERVAL)?;

        let notifications_enabled = env::var("CALDESK_NOTIFICATIONS")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "off" | "no"))
            .unwrap_or(true);

        let upcoming_days = numeric_var("CALDESK_UPCOMING_DAYS", DEFAULT_UPCOMING_DAYS)?;

        let mut config = Config {
            google_client_id,
            google_client_secret,
            redirect_uri,
            data_dir,
            calendar_ids,
            refresh_interval,
            notifications_enabled,
            upcoming_days,
        };

        // Load overrides from file if it exists
        config.apply_file(Path::new(CONFIG_FILE))?;

        Ok(config)
    }

    /// Merge overrides from a TOML file; a missing file is not an error
    pub fn apply_file(&mut self, path: &Path) -> WidgetResult<()> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let overrides: FileOverrides = toml::from_str(&content)
            .map_err(|e| config_error(&format!("Invalid {}: {}", path.display(), e)))?;
        if let Some(uri) = overrides.redirect_uri {
            self.redirect_uri = uri;
        }
        if let Some(dir) = overrides.data_dir {
            self.data_dir = dir;
        }
        if let Some(ids) = overrides.calendar_ids {
            if !ids.is_empty() {
                self.calendar_ids = ids;
            }
        }
        if let Some(interval) = overrides.refresh_interval {
            self.refresh_interval = interval;
        }
        if let Some(enabled) = overrides.notifications_enabled {
            self.notifications_enabled = enabled;
        }
        if let Some(days) = overrides.upcoming_days {
            self.upcoming_days = days;
        }

        Ok(())
    }

    /// Config with credentials only, everything else defaulted
    pub fn with_credentials(client_id: &str, client_secret: &str, data_dir: PathBuf) -> Self {
        Config {
            google_client_id: client_id.to_string(),
            google_client_secret: client_secret.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            data_dir,
            calendar_ids: vec!["primary".to_string()],
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            notifications_enabled: true,
            upcoming_days: DEFAULT_UPCOMING_DAYS,
        }
    }
}

/// Per-user data directory, falling back to the working directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("caldesk"))
        .unwrap_or_else(|| PathBuf::from(".caldesk"))
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> WidgetResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| env_error(&format!("Invalid {} format: {}", name, raw)))
}

/// Numeric variable, or `default` when unset
fn numeric_var<T: FromStr>(name: &str, default: T) -> WidgetResult<T> {
    match env::var(name) {
        Ok(raw) => parse_number(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_calendar_ids(raw: &str) -> Vec<String> {
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if ids.is_empty() {
        vec!["primary".to_string()]
    } else {
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn calendar_ids_are_trimmed_and_default_to_primary() {
        assert_eq!(parse_calendar_ids(" a@x.com , b "), vec!["a@x.com", "b"]);
        assert_eq!(parse_calendar_ids(" , "), vec!["primary"]);
    }

    #[test]
    fn numeric_values_must_parse() {
        assert_eq!(parse_number::<u64>("CALDESK_REFRESH_INTERVAL", " 60 ").unwrap(), 60);
        let err = parse_number::<i64>("CALDESK_UPCOMING_DAYS", "a week").unwrap_err();
        assert!(matches!(err, Error::Environment(_)));
        assert!(err.to_string().contains("Invalid CALDESK_UPCOMING_DAYS format"));
    }

    #[test]
    fn file_overrides_replace_non_secret_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caldesk.toml");
        fs::write(
            &path,
            "calendar_ids = [\"work\", \"home\"]\nrefresh_interval = 60\nnotifications_enabled = false\n",
        )
        .unwrap();

        let mut config = Config::with_credentials("id", "secret", dir.path().to_path_buf());
        config.apply_file(&path).unwrap();

        assert_eq!(config.calendar_ids, vec!["work", "home"]);
        assert_eq!(config.refresh_interval, 60);
        assert!(!config.notifications_enabled);
        assert_eq!(config.google_client_id, "id");
        assert_eq!(config.upcoming_days, DEFAULT_UPCOMING_DAYS);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caldesk.toml");
        fs::write(&path, "refresh_interval = \"soon\"\n").unwrap();

        let mut config = Config::with_credentials("id", "secret", dir.path().to_path_buf());
        let err = config.apply_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("caldesk.toml"));
    }

    #[test]
    fn missing_file_is_ignored() {
        let mut config = Config::with_credentials("id", "secret", PathBuf::from("/tmp"));
        config
            .apply_file(Path::new("/definitely/not/here.toml"))
            .unwrap();
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
    }
}
