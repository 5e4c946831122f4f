//! Maps raw source strings to typed [`StreamSource`] values.

use tracing::warn;
use url::Url;

use crate::config::PlayerConfig;
use crate::errors::InvalidSource;
use crate::model::{StreamKind, StreamSource};

/// Pure classifier: no I/O, no state besides its configured markers.
#[derive(Clone, Debug)]
pub struct SourceClassifier {
    placeholder_prefixes: Vec<String>,
    playlist_extensions: Vec<String>,
    manifest_query_tokens: Vec<String>,
}

impl Default for SourceClassifier {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}

impl SourceClassifier {
    pub fn from_config(config: &PlayerConfig) -> Self {
        let lower = |v: &[String]| v.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>();
        Self {
            placeholder_prefixes: config.placeholder_prefixes.clone(),
            playlist_extensions: lower(&config.playlist_extensions),
            manifest_query_tokens: lower(&config.manifest_query_tokens),
        }
    }

    /// Validates `raw` and routes it to the adaptive backend when it carries a
    /// playlist marker, to the embedded frame otherwise.
    pub fn classify(&self, raw: &str) -> Result<StreamSource, InvalidSource> {
        let url = self.parse(raw)?;
        let kind = if self.has_playlist_marker(&url) {
            StreamKind::Adaptive
        } else {
            StreamKind::Iframe
        };
        Ok(StreamSource::new(url, kind))
    }

    /// Classification for manually typed URLs: these are always playlists.
    ///
    /// A URL without a marker is still accepted, some servers hand out
    /// playlists from extension-less endpoints.
    pub fn classify_manual(&self, raw: &str) -> Result<StreamSource, InvalidSource> {
        let url = self.parse(raw)?;
        if !self.has_playlist_marker(&url) {
            warn!(url = %url, "URL does not look like a playlist, attempting to load anyway");
        }
        Ok(StreamSource::new(url, StreamKind::Adaptive))
    }

    fn parse(&self, raw: &str) -> Result<Url, InvalidSource> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InvalidSource::Empty);
        }
        if self
            .placeholder_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && raw.starts_with(prefix.as_str()))
        {
            return Err(InvalidSource::Placeholder(raw.to_string()));
        }

        let url = Url::parse(raw).map_err(|e| InvalidSource::Malformed(raw.to_string(), e))?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            _ => Err(InvalidSource::UnsupportedScheme(raw.to_string())),
        }
    }

    fn has_playlist_marker(&self, url: &Url) -> bool {
        let path = url.path().to_lowercase();
        if self
            .playlist_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            return true;
        }

        let query = url.query().unwrap_or_default().to_lowercase();
        !query.is_empty()
            && self
                .manifest_query_tokens
                .iter()
                .any(|token| query.contains(token.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> SourceClassifier {
        SourceClassifier::default()
    }

    #[test]
    fn test_playlist_extension_is_adaptive() {
        let source = classifier().classify("https://x.test/a/live.m3u8").unwrap();
        assert_eq!(source.kind(), StreamKind::Adaptive);
        assert_eq!(source.url().as_str(), "https://x.test/a/live.m3u8");

        let upper = classifier().classify("http://x.test/LIVE.M3U8").unwrap();
        assert_eq!(upper.kind(), StreamKind::Adaptive);
    }

    #[test]
    fn test_manifest_query_token_is_adaptive() {
        let source = classifier()
            .classify("https://cdn.test/play?format=m3u8&id=4")
            .unwrap();
        assert_eq!(source.kind(), StreamKind::Adaptive);
    }

    #[test]
    fn test_plain_page_is_iframe() {
        let source = classifier()
            .classify("https://www.provider.test/embed/live_stream?channel=abc")
            .unwrap();
        assert_eq!(source.kind(), StreamKind::Iframe);
    }

    #[test]
    fn test_rejections() {
        let c = classifier();
        assert_eq!(c.classify(""), Err(InvalidSource::Empty));
        assert_eq!(c.classify("   "), Err(InvalidSource::Empty));
        assert!(matches!(
            c.classify("YOUR_CHANNEL_3_URL"),
            Err(InvalidSource::Placeholder(_))
        ));
        assert!(matches!(
            c.classify("ftp://bad"),
            Err(InvalidSource::UnsupportedScheme(_))
        ));
        assert!(matches!(
            c.classify("not a url"),
            Err(InvalidSource::Malformed(_, _))
        ));
        assert!(matches!(
            c.classify("/relative/live.m3u8"),
            Err(InvalidSource::Malformed(_, _))
        ));
    }

    #[test]
    fn test_manual_entry_is_always_adaptive() {
        let source = classifier()
            .classify_manual("  https://x.test/stream  ")
            .unwrap();
        assert_eq!(source.kind(), StreamKind::Adaptive);
        assert!(classifier().classify_manual("ftp://x.test/a.m3u8").is_err());
    }

    #[test]
    fn test_same_input_same_source() {
        let c = classifier();
        assert_eq!(
            c.classify("https://x.test/a.m3u8").unwrap(),
            c.classify("https://x.test/a.m3u8").unwrap()
        );
    }
}
