//! Daily background image
//!
//! Primary: `{mirror}/v2/bing`. Secondary: the official image archive, whose
//! image paths are relative and have to be joined onto the archive host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{normalize_day, FeedSource, Fetched};
use crate::config::FeedsConfig;
use crate::error::FetchError;
use crate::fetch::{mirror_data, FetchOrchestrator, Secondary};
use crate::text::repair_mis_decoded;

const FAMILY: &str = "wallpaper";

/// Normalized wallpaper shown as the page background
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallpaper {
    /// Absolute image URL
    pub cover: String,
    pub title: String,
    pub description: String,
    pub copyright: String,
}

/// Mirror response body (`data` object)
#[derive(Debug, Deserialize)]
struct MirrorBing {
    #[serde(default)]
    title: String,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    main_text: String,
    #[serde(default)]
    cover: String,
    #[serde(default)]
    copyright: String,
    update_date: Option<String>,
}

/// Official archive response
#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    #[serde(default)]
    images: Vec<ArchiveImage>,
}

#[derive(Debug, Deserialize)]
struct ArchiveImage {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    copyright: String,
    startdate: Option<String>,
}

/// Fetches the wallpaper from the mirrors, falling back to the archive
#[derive(Debug, Clone)]
pub struct WallpaperSource {
    ttl: Duration,
    timeout: Duration,
    archive_host: String,
    market: &'static str,
}

impl WallpaperSource {
    pub fn new(config: &FeedsConfig) -> Self {
        Self {
            ttl: config.wallpaper_ttl,
            timeout: config.feed_timeout,
            archive_host: config.bing_host.trim_end_matches('/').to_string(),
            market: config.market(),
        }
    }

    fn archive_url(&self) -> String {
        format!(
            "{}/HPImageArchive.aspx?format=js&idx=0&n=1&mkt={}",
            self.archive_host, self.market
        )
    }

    async fn fetch_archive(&self, orchestrator: &FetchOrchestrator) -> Result<Fetched<Wallpaper>, FetchError> {
        let body = orchestrator.get_json(&self.archive_url(), self.timeout).await?;
        parse_archive(body, &self.archive_host)
    }
}

#[async_trait]
impl FeedSource for WallpaperSource {
    type Payload = Wallpaper;

    fn family(&self) -> &'static str {
        FAMILY
    }

    fn cache_key(&self) -> String {
        FAMILY.to_string()
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn fetch(&self, orchestrator: &FetchOrchestrator) -> Result<Fetched<Wallpaper>, FetchError> {
        let secondary: Secondary<'_, Fetched<Wallpaper>> = Box::pin(self.fetch_archive(orchestrator));
        orchestrator
            .fetch_with_failover(
                FAMILY,
                |base| format!("{}/v2/bing", base),
                parse_mirror,
                self.timeout,
                Some(secondary),
            )
            .await
    }
}

/// Validates and normalizes a mirror response
fn parse_mirror(body: Value) -> Result<Fetched<Wallpaper>, FetchError> {
    let bing: MirrorBing = serde_json::from_value(mirror_data(body)?)?;
    if bing.cover.trim().is_empty() {
        return Err(FetchError::rejected("empty cover"));
    }

    let description = [&bing.description, &bing.main_text, &bing.headline]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_default();

    let wallpaper = Wallpaper {
        cover: bing.cover,
        title: repair_mis_decoded(&bing.title),
        description: repair_mis_decoded(&description),
        copyright: repair_mis_decoded(&bing.copyright),
    };
    let day = bing.update_date.as_deref().and_then(normalize_day);
    Ok(Fetched::new(wallpaper, day))
}

/// Validates and normalizes an archive response
fn parse_archive(body: Value, host: &str) -> Result<Fetched<Wallpaper>, FetchError> {
    let archive: ArchiveResponse = serde_json::from_value(body)?;
    let image = archive
        .images
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::rejected("no images"))?;
    if image.url.trim().is_empty() {
        return Err(FetchError::rejected("empty image url"));
    }

    let cover = Url::parse(host)
        .and_then(|host| host.join(&image.url))
        .map_err(|e| FetchError::malformed(format!("bad image url '{}': {}", image.url, e)))?;

    let (caption, credit) = split_copyright(&image.copyright);
    let title = if image.title.trim().is_empty() {
        caption.clone()
    } else {
        image.title
    };

    let wallpaper = Wallpaper {
        cover: cover.to_string(),
        title,
        description: caption,
        copyright: credit,
    };
    let day = image.startdate.as_deref().and_then(normalize_day);
    Ok(Fetched::new(wallpaper, day))
}

/// Splits `"Caption (© Credit)"` into its caption and credit
fn split_copyright(copyright: &str) -> (String, String) {
    match copyright.rsplit_once(" (") {
        Some((caption, credit)) if credit.ends_with(')') => (
            caption.trim().to_string(),
            credit.trim_end_matches(')').trim().to_string(),
        ),
        _ => (copyright.trim().to_string(), copyright.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::instances::InstanceDirectory;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_falls_back_to_archive_when_mirrors_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/m1/v2/bing"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m2/v2/bing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": {"cover": ""}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/HPImageArchive.aspx"))
            .and(query_param("mkt", "zh-CN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [{
                    "startdate": "20260105",
                    "url": "/th?id=OHR.Lake_1920x1080.jpg",
                    "title": "Winter lake",
                    "copyright": "Lake at dawn (© Photographer)"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = FeedsConfig {
            mirrors: vec![format!("{}/m1", server.uri()), format!("{}/m2", server.uri())],
            bing_host: server.uri(),
            ..FeedsConfig::default()
        };
        let directory = InstanceDirectory::new(config.mirrors.clone(), Arc::new(MemoryStore::new()));
        let orchestrator = FetchOrchestrator::new(directory);

        let fetched = WallpaperSource::new(&config)
            .fetch(&orchestrator)
            .await
            .expect("Archive should serve the wallpaper");

        assert_eq!(
            fetched.payload.cover,
            format!("{}/th?id=OHR.Lake_1920x1080.jpg", server.uri())
        );
        assert_eq!(fetched.payload.title, "Winter lake");
        assert_eq!(fetched.day.as_deref(), Some("2026-01-05"));
        assert!(orchestrator.directory().preferred("wallpaper").await.is_none());
    }

    #[test]
    fn test_parse_mirror_response() {
        let body = json!({
            "code": 200,
            "message": "ok",
            "data": {
                "title": "Winter lake",
                "headline": "Frozen",
                "description": "A lake at dawn",
                "main_text": "",
                "cover": "https://cn.bing.com/th?id=OHR.Lake_1920x1080.jpg",
                "copyright": "© Someone",
                "update_date": "2026-01-05 08:00:00"
            }
        });

        let fetched = parse_mirror(body).expect("Valid response should parse");
        assert_eq!(fetched.payload.title, "Winter lake");
        assert_eq!(fetched.payload.description, "A lake at dawn");
        assert_eq!(fetched.payload.cover, "https://cn.bing.com/th?id=OHR.Lake_1920x1080.jpg");
        assert_eq!(fetched.day.as_deref(), Some("2026-01-05"));
    }

    #[test]
    fn test_parse_mirror_falls_back_to_main_text() {
        let body = json!({"code": 200, "data": {"cover": "https://x/a.jpg", "main_text": "Body text"}});
        let fetched = parse_mirror(body).unwrap();
        assert_eq!(fetched.payload.description, "Body text");
        assert!(fetched.day.is_none());
    }

    #[test]
    fn test_parse_mirror_rejects_empty_cover() {
        let body = json!({"code": 200, "data": {"title": "x", "cover": ""}});
        assert_eq!(parse_mirror(body).unwrap_err(), FetchError::rejected("empty cover"));
    }

    #[test]
    fn test_parse_mirror_rejects_failure_code() {
        let body = json!({"code": 500, "data": {"cover": "https://x/a.jpg"}});
        assert!(matches!(parse_mirror(body).unwrap_err(), FetchError::UpstreamRejected(_)));
    }

    #[test]
    fn test_parse_archive_joins_relative_url() {
        let body = json!({
            "images": [{
                "startdate": "20260105",
                "url": "/th?id=OHR.Lake_1920x1080.jpg&rf=LaDigue_1920x1080.jpg",
                "title": "Winter lake",
                "copyright": "Lake at dawn, Finland (© Photographer/Getty Images)"
            }]
        });

        let fetched = parse_archive(body, "https://www.bing.com").expect("Archive should parse");
        assert_eq!(
            fetched.payload.cover,
            "https://www.bing.com/th?id=OHR.Lake_1920x1080.jpg&rf=LaDigue_1920x1080.jpg"
        );
        assert_eq!(fetched.payload.title, "Winter lake");
        assert_eq!(fetched.payload.description, "Lake at dawn, Finland");
        assert_eq!(fetched.payload.copyright, "© Photographer/Getty Images");
        assert_eq!(fetched.day.as_deref(), Some("2026-01-05"));
    }

    #[test]
    fn test_parse_archive_rejects_empty_list() {
        assert_eq!(
            parse_archive(json!({"images": []}), "https://www.bing.com").unwrap_err(),
            FetchError::rejected("no images")
        );
        assert!(matches!(
            parse_archive(json!({"images": "nope"}), "https://www.bing.com").unwrap_err(),
            FetchError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_split_copyright_without_credit() {
        assert_eq!(
            split_copyright("Just a caption"),
            ("Just a caption".to_string(), "Just a caption".to_string())
        );
    }

    #[test]
    fn test_archive_url_uses_market() {
        let config = FeedsConfig {
            locale: "en-US".to_string(),
            bing_host: "https://www.bing.com/".to_string(),
            ..FeedsConfig::default()
        };
        let source = WallpaperSource::new(&config);
        assert_eq!(
            source.archive_url(),
            "https://www.bing.com/HPImageArchive.aspx?format=js&idx=0&n=1&mkt=en-US"
        );
    }
}
