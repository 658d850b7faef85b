//! Forecast bearer scraped from the public weather map
//!
//! The page embeds its own access token in a script block. There is no API
//! for it, so the token is cut out of the raw page text: find the
//! `accessToken` marker, then take everything between the next two double
//! quotes. When the marker is followed directly by the closing quote of a
//! JSON key, that quote is skipped first. Nothing is parsed as JSON.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use homeboard_sources::weather::TokenPage;

const MARKER: &str = "accessToken";

/// Extract the token following [`MARKER`] in `page`.
pub fn scrape_token(page: &str) -> Option<String> {
    let after_marker = page.find(MARKER)? + MARKER.len();
    let mut rest = &page[after_marker..];
    if let Some(stripped) = rest.strip_prefix('"') {
        rest = stripped;
    }

    let start = rest.find('"')? + 1;
    let len = rest[start..].find('"')?;
    Some(rest[start..start + len].to_string())
}

/// Holds the scraped bearer for the lifetime of the process.
///
/// At most one scrape is in flight; concurrent callers wait for it and
/// share its result.
pub struct WeatherTokenCache {
    page: Arc<dyn TokenPage>,
    token: RwLock<Option<String>>,
    scrape: Mutex<()>,
}

impl WeatherTokenCache {
    pub fn new(page: Arc<dyn TokenPage>) -> Self {
        Self {
            page,
            token: RwLock::new(None),
            scrape: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Forget the cached token so the next call scrapes again
    pub fn invalidate(&self) {
        *self.token.write() = None;
    }

    /// Return the cached token, scraping the page when there is none.
    ///
    /// Never fails: an unreachable page or a missing marker is logged and
    /// yields `None`, and the caller carries on without a token.
    pub async fn ensure_token(&self) -> Option<String> {
        if let Some(token) = self.current() {
            return Some(token);
        }

        let _scrape = self.scrape.lock().await;
        if let Some(token) = self.current() {
            return Some(token);
        }

        let page = match self.page.fetch_page().await {
            Ok(page) => page,
            Err(e) => {
                warn!(source = "weather", error = %e, "weather map page unavailable");
                return None;
            }
        };

        match scrape_token(&page) {
            Some(token) => {
                info!(source = "weather", "got forecast token");
                *self.token.write() = Some(token.clone());
                Some(token)
            }
            None => {
                warn!(source = "weather", "no forecast token on weather map page");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use homeboard_sources::SourceError;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakePage {
        body: Option<String>,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl FakePage {
        fn serving(body: Option<&str>) -> Arc<Self> {
            Self::slow(body, Duration::ZERO)
        }

        fn slow(body: Option<&str>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                body: body.map(str::to_string),
                fetches: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl TokenPage for FakePage {
        async fn fetch_page(&self) -> homeboard_sources::Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.body
                .clone()
                .ok_or_else(|| SourceError::Parse("unreachable".to_string()))
        }
    }

    #[rstest]
    #[case(r#"{"accessToken":"XYZ123"}"#, Some("XYZ123"))]
    #[case(r#"window.cfg = {accessToken: "5f3c|a8d1", locale: "en"}"#, Some("5f3c|a8d1"))]
    #[case(r#"accessToken":"" "#, Some(""))]
    #[case(r#"<html>no token here</html>"#, None)]
    #[case(r#"accessToken":"unterminated"#, None)]
    fn test_scrape(#[case] page: &str, #[case] expected: Option<&str>) {
        assert_eq!(scrape_token(page).as_deref(), expected);
    }

    #[tokio::test]
    async fn test_token_is_scraped_once() {
        let page = FakePage::serving(Some(r#"<script>var c={"accessToken":"XYZ123"}</script>"#));
        let cache = WeatherTokenCache::new(page.clone());

        assert_eq!(cache.ensure_token().await.as_deref(), Some("XYZ123"));
        assert_eq!(cache.ensure_token().await.as_deref(), Some("XYZ123"));
        assert_eq!(page.fetches.load(Ordering::SeqCst), 1);

        cache.invalidate();
        cache.ensure_token().await;
        assert_eq!(page.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_scrape() {
        let page = FakePage::slow(Some(r#"{"accessToken":"XYZ123"}"#), Duration::from_millis(50));
        let cache = WeatherTokenCache::new(page.clone());

        let (first, second) = tokio::join!(cache.ensure_token(), cache.ensure_token());

        assert_eq!(first.as_deref(), Some("XYZ123"));
        assert_eq!(second.as_deref(), Some("XYZ123"));
        assert_eq!(page.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_marker_is_not_fatal() {
        let cache = WeatherTokenCache::new(FakePage::serving(Some("<html></html>")));
        assert_eq!(cache.ensure_token().await, None);
        assert_eq!(cache.current(), None);

        let unreachable = WeatherTokenCache::new(FakePage::serving(None));
        assert_eq!(unreachable.ensure_token().await, None);
    }
}
