use caldesk::components::window::started_hidden;
use caldesk::service::WidgetEvent;
use caldesk::{bridge, shutdown, startup};
use tokio::io::BufReader;
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info};

/// Resolves when the tray asks to quit
async fn quit_requested(mut events: broadcast::Receiver<WidgetEvent>) {
    loop {
        match events.recv().await {
            Ok(WidgetEvent::Quit) | Err(broadcast::error::RecvError::Closed) => return,
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting CalDesk");

    // Load configuration
    let config = startup::load_config().await?;
    let service = startup::build_service(config).await?;

    startup::restore(&service, started_hidden(std::env::args())).await;

    // Periodic refresh of today's events
    let refresher = service.clone();
    let refresh_task = tokio::spawn(async move { refresher.run_refresh_loop().await });

    // Create shutdown channel and spawn signal handler task
    let (shutdown_send, shutdown_recv) = oneshot::channel();
    tokio::spawn(shutdown::handle_signals(shutdown_send));

    let quit = quit_requested(service.subscribe());
    let bridge = bridge::serve(
        service.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    );

    // Wait for the UI to go away, a quit from the tray or a signal
    let result = tokio::select! {
        result = bridge => {
            info!("Bridge closed");
            result
        }
        _ = quit => {
            info!("Quit requested from tray");
            Ok(())
        }
        Ok(()) = shutdown_recv => {
            info!("Received shutdown signal, shutting down...");
            Ok(())
        }
    };

    refresh_task.abort();
    shutdown::shutdown_service(&service).await;

    if let Err(e) = &result {
        error!("Bridge error: {:?}", e);
    }
    result.map_err(Into::into)
}
