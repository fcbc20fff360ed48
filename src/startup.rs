use crate::components::notifications::{DesktopNotifier, Notifier, SilentNotifier};
use crate::components::token_store::TokenStore;
use crate::components::window::{AutoStart, HeadlessWindow, WindowBackend};
use crate::config::Config;
use crate::error::Error;
use crate::service::WidgetService;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration. Logs go to
/// stderr; stdout belongs to the bridge.
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Build the widget service with the desktop integrations
pub async fn build_service(
    config: Arc<RwLock<Config>>,
) -> miette::Result<WidgetService<HeadlessWindow>> {
    let (data_dir, notifications_enabled) = {
        let config_read = config.read().await;
        (config_read.data_dir.clone(), config_read.notifications_enabled)
    };
    info!("Using data directory {}", data_dir.display());

    let notifier: Arc<dyn Notifier> = if notifications_enabled {
        Arc::new(DesktopNotifier::default())
    } else {
        Arc::new(SilentNotifier)
    };

    let autostart = match AutoStart::for_current_exe() {
        Ok(autostart) => Some(autostart),
        Err(e) => {
            warn!("Auto start unavailable: {}", e);
            None
        }
    };

    let service = WidgetService::new(
        config,
        TokenStore::with_keyring(&data_dir),
        HeadlessWindow::default(),
        notifier,
        autostart,
    )
    .await?;

    Ok(service)
}

/// Open the window and restore the previous session, if any
pub async fn restore<B: WindowBackend + 'static>(service: &WidgetService<B>, hidden: bool) {
    service.open_window(hidden).await;
    if hidden {
        info!("Started hidden");
    }

    match service.load_stored_auth().await {
        Some(auth) => info!("Restored session for {}", auth.user.email),
        None => info!("No stored session, waiting for sign-in"),
    }
}
