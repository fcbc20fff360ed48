use caldesk::components::google_auth::{
    ConsentTiming, GoogleAuthService, OAuthClient, TerminalConsentPage, TokenManager,
};
use caldesk::components::token_store::TokenStore;
use caldesk::config::Config;
use caldesk::error::WidgetResult;

#[tokio::main]
async fn main() -> WidgetResult<()> {
    // Load configuration
    let config = Config::load()?;

    // Token manager backed by the same store the widget reads
    let client = OAuthClient::from_config(&config)?;
    let store = TokenStore::with_keyring(&config.data_dir);
    let auth = GoogleAuthService::new(TokenManager::new(client, store))
        .with_timing(ConsentTiming::immediate());

    // Skip the browser when running over ssh or similar
    let open_browser = !std::env::args().any(|arg| arg == "--no-browser");
    let mut page = TerminalConsentPage::new(open_browser);

    let auth_data = auth.google_auth(&mut page).await?;

    println!(
        "Signed in as {} <{}>. Tokens saved to {}",
        auth_data.user.name,
        auth_data.user.email,
        config.data_dir.display()
    );

    Ok(())
}
