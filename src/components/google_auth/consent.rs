use super::code::extract_code;
use crate::error::{auth_error, WidgetResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

/// Lifecycle events of the page showing Google's consent screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Navigated(String),
    FinishedLoading,
    Closed,
}

/// Whatever shows the consent screen to the user and lets us read it back
#[async_trait]
pub trait ConsentPage: Send {
    async fn load(&mut self, url: &Url) -> WidgetResult<()>;

    /// Next lifecycle event; `None` means the page is gone
    async fn next_event(&mut self) -> Option<PageEvent>;

    async fn current_url(&mut self) -> String;

    /// Visible text of the page, when it can be read
    async fn page_text(&mut self) -> Option<String>;

    async fn close(&mut self);
}

/// Delays before scraping, giving the approval page time to render
#[derive(Debug, Clone, Copy)]
pub struct ConsentTiming {
    pub after_navigation: Duration,
    pub after_load: Duration,
}

impl Default for ConsentTiming {
    fn default() -> Self {
        Self {
            after_navigation: Duration::from_secs(4),
            after_load: Duration::from_secs(2),
        }
    }
}

impl ConsentTiming {
    pub fn immediate() -> Self {
        Self {
            after_navigation: Duration::ZERO,
            after_load: Duration::ZERO,
        }
    }
}

fn is_google_page(url: &str) -> bool {
    url.contains("google.com")
}

async fn try_extract<P: ConsentPage + ?Sized>(page: &mut P) -> Option<String> {
    let url = page.current_url().await;
    debug!("Checking URL for auth code: {}", url);
    let text = page.page_text().await;
    extract_code(&url, text.as_deref())
}

/// Drive the consent page until an authorization code shows up
pub async fn wait_for_code<P: ConsentPage + ?Sized>(
    page: &mut P,
    auth_url: &Url,
    timing: ConsentTiming,
) -> WidgetResult<String> {
    page.load(auth_url).await?;

    while let Some(event) = page.next_event().await {
        let delay = match &event {
            PageEvent::Navigated(url) if is_google_page(url) => {
                debug!("Navigation detected: {}", url);
                timing.after_navigation
            }
            PageEvent::FinishedLoading => {
                let url = page.current_url().await;
                if !is_google_page(&url) {
                    continue;
                }
                debug!("Page finished loading: {}", url);
                timing.after_load
            }
            PageEvent::Navigated(_) => continue,
            PageEvent::Closed => break,
        };

        if !delay.is_zero() {
            sleep(delay).await;
        }

        if let Some(code) = try_extract(page).await {
            info!("Authorization code received");
            page.close().await;
            return Ok(code);
        }
    }

    Err(auth_error("Authentication window was closed"))
}

/// Consent page backed by the system browser and the terminal: the user
/// pastes the final page's URL or its text back into the console
pub struct TerminalConsentPage {
    lines: Lines<BufReader<Stdin>>,
    current_url: String,
    text: String,
    open_browser: bool,
}

impl TerminalConsentPage {
    pub fn new(open_browser: bool) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            current_url: String::new(),
            text: String::new(),
            open_browser,
        }
    }
}

#[async_trait]
impl ConsentPage for TerminalConsentPage {
    async fn load(&mut self, url: &Url) -> WidgetResult<()> {
        self.current_url = url.to_string();
        eprintln!("Sign in with Google using this URL:\n\n  {}\n", url);
        if self.open_browser {
            if let Err(e) = webbrowser::open(url.as_str()) {
                eprintln!("Could not open a browser ({}), open the URL manually.", e);
            }
        }
        eprintln!(
            "When Google shows the authorization code, paste the page URL or the code text here (empty line cancels):"
        );
        Ok(())
    }

    async fn next_event(&mut self) -> Option<PageEvent> {
        let line = match self.lines.next_line().await {
            Ok(Some(line)) => line,
            _ => return Some(PageEvent::Closed),
        };

        let line = line.trim();
        if line.is_empty() {
            return Some(PageEvent::Closed);
        }

        if Url::parse(line).is_ok() {
            self.current_url = line.to_string();
            return Some(PageEvent::Navigated(line.to_string()));
        }

        self.text.push_str(line);
        self.text.push('\n');
        Some(PageEvent::FinishedLoading)
    }

    async fn current_url(&mut self) -> String {
        self.current_url.clone()
    }

    async fn page_text(&mut self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(self.text.clone())
        }
    }

    async fn close(&mut self) {
        eprintln!("Authorization code received.");
    }
}

/// Page change reported by the process that shows the consent screen
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub kind: PageReportKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageReportKind {
    Navigated,
    FinishedLoading,
    Closed,
}

/// Requests going out to the process that owns the consent screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCommand {
    Open(Url),
    Close,
}

/// Consent page rendered elsewhere (the UI process) and reported over a
/// channel
pub struct ChannelConsentPage {
    reports: mpsc::Receiver<PageReport>,
    commands: Box<dyn Fn(PageCommand) + Send + Sync>,
    current_url: String,
    text: Option<String>,
}

impl ChannelConsentPage {
    pub fn new(
        reports: mpsc::Receiver<PageReport>,
        commands: impl Fn(PageCommand) + Send + Sync + 'static,
    ) -> Self {
        Self {
            reports,
            commands: Box::new(commands),
            current_url: String::new(),
            text: None,
        }
    }
}

#[async_trait]
impl ConsentPage for ChannelConsentPage {
    async fn load(&mut self, url: &Url) -> WidgetResult<()> {
        self.current_url = url.to_string();
        (self.commands)(PageCommand::Open(url.clone()));
        Ok(())
    }

    async fn next_event(&mut self) -> Option<PageEvent> {
        let report = self.reports.recv().await?;
        if let Some(url) = report.url {
            self.current_url = url;
        }
        if report.text.is_some() {
            self.text = report.text;
        }

        Some(match report.kind {
            PageReportKind::Navigated => PageEvent::Navigated(self.current_url.clone()),
            PageReportKind::FinishedLoading => PageEvent::FinishedLoading,
            PageReportKind::Closed => PageEvent::Closed,
        })
    }

    async fn current_url(&mut self) -> String {
        self.current_url.clone()
    }

    async fn page_text(&mut self) -> Option<String> {
        self.text.clone()
    }

    async fn close(&mut self) {
        (self.commands)(PageCommand::Close);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Page that replays a script of (event, url after event, text)
    pub(crate) struct ScriptedPage {
        pub script: VecDeque<(PageEvent, String, Option<String>)>,
        pub url: String,
        pub text: Option<String>,
        pub closed: usize,
    }

    impl ScriptedPage {
        pub(crate) fn new(script: Vec<(PageEvent, &str, Option<&str>)>) -> Self {
            Self {
                script: script
                    .into_iter()
                    .map(|(e, u, t)| (e, u.to_string(), t.map(str::to_string)))
                    .collect(),
                url: String::new(),
                text: None,
                closed: 0,
            }
        }
    }

    #[async_trait]
    impl ConsentPage for ScriptedPage {
        async fn load(&mut self, url: &Url) -> WidgetResult<()> {
            self.url = url.to_string();
            Ok(())
        }

        async fn next_event(&mut self) -> Option<PageEvent> {
            let (event, url, text) = self.script.pop_front()?;
            self.url = url;
            self.text = text;
            Some(event)
        }

        async fn current_url(&mut self) -> String {
            self.url.clone()
        }

        async fn page_text(&mut self) -> Option<String> {
            self.text.clone()
        }

        async fn close(&mut self) {
            self.closed += 1;
        }
    }

    const CODE: &str = "4/1AfJohXn3k2Qx7_abcdefghijklmnopqrstuvwxyz0123456789-ZZ";

    fn auth_url() -> Url {
        Url::parse("https://accounts.google.com/o/oauth2/v2/auth?client_id=x").unwrap()
    }

    #[tokio::test]
    async fn code_from_navigation_closes_page_once() {
        let approval = format!("https://accounts.google.com/approval?approvalCode={}", CODE);
        let mut page = ScriptedPage::new(vec![
            (PageEvent::Navigated("https://accounts.google.com/signin".into()), "https://accounts.google.com/signin", None),
            (PageEvent::Navigated(approval.clone()), approval.as_str(), None),
            (PageEvent::FinishedLoading, approval.as_str(), None),
        ]);

        let code = wait_for_code(&mut page, &auth_url(), ConsentTiming::immediate())
            .await
            .unwrap();
        assert_eq!(code, CODE);
        assert_eq!(page.closed, 1);
        // the trailing load event is never consumed
        assert_eq!(page.script.len(), 1);
    }

    #[tokio::test]
    async fn non_google_pages_are_ignored() {
        let text = format!("paste it there: {}", CODE);
        let mut page = ScriptedPage::new(vec![
            (PageEvent::FinishedLoading, "https://example.com/", Some(text.as_str())),
            (PageEvent::Closed, "https://example.com/", None),
        ]);

        let err = wait_for_code(&mut page, &auth_url(), ConsentTiming::immediate())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Authentication window was closed"));
        assert_eq!(page.closed, 0);
    }

    #[tokio::test]
    async fn code_from_page_text_after_load() {
        let text = format!("Authorisation code\nCopy this code: {}", CODE);
        let mut page = ScriptedPage::new(vec![(
            PageEvent::FinishedLoading,
            "https://accounts.google.com/o/oauth2/approval",
            Some(text.as_str()),
        )]);

        let code = wait_for_code(&mut page, &auth_url(), ConsentTiming::immediate())
            .await
            .unwrap();
        assert_eq!(code, CODE);
    }

    #[tokio::test]
    async fn script_running_out_means_closed() {
        let mut page = ScriptedPage::new(vec![]);
        assert!(wait_for_code(&mut page, &auth_url(), ConsentTiming::immediate())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn channel_page_opens_and_closes_through_callback() {
        let (tx, rx) = mpsc::channel(4);
        let sent = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = sent.clone();
        let mut page = ChannelConsentPage::new(rx, move |cmd| log.lock().unwrap().push(cmd));

        let approval = format!("https://accounts.google.com/o/oauth2/approval?approvalCode={}", CODE);
        tx.send(PageReport {
            kind: PageReportKind::Navigated,
            url: Some(approval),
            text: None,
        })
        .await
        .unwrap();

        let code = wait_for_code(&mut page, &auth_url(), ConsentTiming::immediate())
            .await
            .unwrap();
        assert_eq!(code, CODE);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], PageCommand::Open(_)));
        assert_eq!(sent[1], PageCommand::Close);
    }

    #[test]
    fn page_reports_parse_from_json() {
        let report: PageReport =
            serde_json::from_str(r#"{"kind":"finished-loading","text":"hello"}"#).unwrap();
        assert_eq!(report.kind, PageReportKind::FinishedLoading);
        assert_eq!(report.url, None);
        assert_eq!(report.text.as_deref(), Some("hello"));
    }
}
