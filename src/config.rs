//! Feed configuration
//!
//! TTLs, per-attempt timeouts, the mirror pool and provider hosts. Values
//! start from `Default`, are overridden by environment variables, and finally
//! by command-line flags in the binary.

use std::time::Duration;

/// Public mirrors of the daily-digest API, in the order they are tried
pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://60s.viki.moe",
    "https://60s-api.114128.xyz",
    "https://60s-api-cf.viki.moe",
    "https://60s.b23.run",
    "https://60s.crystelf.top",
    "https://cqxx.site",
    "https://api.yanyua.icu",
    "https://60s.tmini.net",
];

/// Environment variable holding a comma-separated mirror list
pub const ENV_MIRRORS: &str = "TABFEEDS_MIRRORS";
/// Environment variable holding the consumer locale (e.g. `zh-CN`, `en-US`)
pub const ENV_LOCALE: &str = "TABFEEDS_LOCALE";
/// Environment variable holding the weather city
pub const ENV_CITY: &str = "TABFEEDS_CITY";

/// Configuration shared by all feed adapters
#[derive(Debug, Clone, PartialEq)]
pub struct FeedsConfig {
    /// Base addresses of the mirror pool
    pub mirrors: Vec<String>,
    /// Consumer locale, decides the weather provider and description language
    pub locale: String,
    /// City for the weather feed; weather is skipped when `None`
    pub city: Option<String>,
    pub wallpaper_ttl: Duration,
    pub digest_ttl: Duration,
    pub weather_ttl: Duration,
    /// TTL of the subtitle tip derived from the digest
    pub tip_ttl: Duration,
    /// Per-attempt bound for wallpaper and digest requests
    pub feed_timeout: Duration,
    /// Per-attempt bound for weather requests
    pub weather_timeout: Duration,
    /// Host of the official image archive used when every mirror fails
    pub bing_host: String,
    pub geocoding_url: String,
    pub forecast_url: String,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            locale: "zh-CN".to_string(),
            city: None,
            wallpaper_ttl: Duration::from_secs(6 * 60 * 60),
            digest_ttl: Duration::from_secs(30 * 60),
            weather_ttl: Duration::from_secs(15 * 60),
            tip_ttl: Duration::from_secs(24 * 60 * 60),
            feed_timeout: Duration::from_secs(15),
            weather_timeout: Duration::from_secs(5),
            bing_host: "https://www.bing.com".to_string(),
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

impl FeedsConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up through `lookup`
    ///
    /// Empty values are ignored so an exported-but-blank variable keeps the default.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(mirrors) = lookup(ENV_MIRRORS) {
            let parsed = parse_mirrors(&mirrors);
            if !parsed.is_empty() {
                self.mirrors = parsed;
            }
        }
        if let Some(locale) = lookup(ENV_LOCALE) {
            self.locale = locale.trim().to_string();
        }
        if let Some(city) = lookup(ENV_CITY) {
            self.city = Some(city.trim().to_string());
        }
        self
    }

    /// Whether the locale is Chinese, which is what the mirror pool serves
    pub fn is_local_language(&self) -> bool {
        self.locale.to_lowercase().starts_with("zh")
    }

    /// Two-letter language code used for geocoding and weather descriptions
    pub fn language(&self) -> &'static str {
        if self.is_local_language() {
            "zh"
        } else {
            "en"
        }
    }

    /// Market code for the image archive (`zh-CN`, `en-US`)
    pub fn market(&self) -> &'static str {
        if self.is_local_language() {
            "zh-CN"
        } else {
            "en-US"
        }
    }
}

/// Splits a comma-separated mirror list, trimming whitespace and trailing slashes
pub fn parse_mirrors(list: &str) -> Vec<String> {
    list.split(',')
        .map(|m| m.trim().trim_end_matches('/'))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_ttls() {
        let config = FeedsConfig::default();
        assert_eq!(config.wallpaper_ttl, Duration::from_secs(21_600));
        assert_eq!(config.digest_ttl, Duration::from_secs(1_800));
        assert_eq!(config.weather_ttl, Duration::from_secs(900));
        assert_eq!(config.tip_ttl, Duration::from_secs(86_400));
        assert!(config.weather_timeout < config.feed_timeout);
        assert_eq!(config.mirrors.len(), DEFAULT_MIRRORS.len());
    }

    #[test]
    fn test_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_MIRRORS, "https://a.example/, https://b.example"),
            (ENV_LOCALE, "en-GB"),
            (ENV_CITY, " Berlin "),
        ]);
        let config = FeedsConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.mirrors, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.locale, "en-GB");
        assert_eq!(config.city.as_deref(), Some("Berlin"));
        assert!(!config.is_local_language());
        assert_eq!(config.language(), "en");
        assert_eq!(config.market(), "en-US");
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let config = FeedsConfig::default().with_overrides(|k| {
            if k == ENV_MIRRORS {
                Some(" , ".to_string())
            } else {
                Some(String::new())
            }
        });
        assert_eq!(config, FeedsConfig::default());
    }

    #[test]
    fn test_parse_mirrors() {
        assert_eq!(parse_mirrors("x,y/, ,z"), vec!["x", "y", "z"]);
        assert!(parse_mirrors("").is_empty());
    }
}
