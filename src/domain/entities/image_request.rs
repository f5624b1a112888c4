//! Parsed resize request.

use reqwest::Url;

use super::CacheKey;
use crate::domain::errors::InvalidRequest;

/// Minimum number of `/`-separated tokens in a fill path:
/// `""`, `fill`, width, height and at least one url token.
const MIN_SEGMENTS: usize = 5;
const WIDTH_IDX: usize = 2;
const HEIGHT_IDX: usize = 3;
const URL_IDX: usize = 4;

/// Fallback stem for sources whose file name is only an extension.
const DEFAULT_STEM: &str = "image";

/// A validated `/fill/{width}/{height}/{url}` request.
///
/// Built once per inbound request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    width: u32,
    height: u32,
    source_url: Url,
    stem: String,
    extension: String,
}

impl ImageRequest {
    /// Parses a request path such as `/fill/100/50/example.com/img/cat.jpg`.
    ///
    /// Everything after the height is rejoined with `/` and treated as the
    /// source URL; `query` (without the leading `?`) is appended to it. A URL
    /// whose scheme is neither `http` nor `https` is prefixed with `http://`.
    ///
    /// # Errors
    /// Returns the first rule the path breaks, each as a distinct
    /// [`InvalidRequest`] variant.
    pub fn parse(
        path: &str,
        query: Option<&str>,
        max_dimension: u32,
    ) -> Result<Self, InvalidRequest> {
        let tokens: Vec<&str> = path.split('/').collect();
        if tokens.len() < MIN_SEGMENTS {
            return Err(InvalidRequest::MissingSegments {
                path: path.to_string(),
            });
        }

        let width = parse_dimension(tokens[WIDTH_IDX]).ok_or_else(|| {
            InvalidRequest::InvalidWidth {
                value: tokens[WIDTH_IDX].to_string(),
            }
        })?;
        let height = parse_dimension(tokens[HEIGHT_IDX]).ok_or_else(|| {
            InvalidRequest::InvalidHeight {
                value: tokens[HEIGHT_IDX].to_string(),
            }
        })?;
        if width > max_dimension || height > max_dimension {
            return Err(InvalidRequest::DimensionTooLarge {
                width,
                height,
                max: max_dimension,
            });
        }

        let mut raw_url = tokens[URL_IDX..].join("/");
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            raw_url.push('?');
            raw_url.push_str(query);
        }
        let source_url = parse_source_url(&raw_url)?;
        let (stem, extension) = split_file_name(&source_url)?;

        Ok(Self {
            width,
            height,
            source_url,
            stem,
            extension,
        })
    }

    /// Target width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Target height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Normalized absolute source URL.
    #[must_use]
    pub const fn source_url(&self) -> &Url {
        &self.source_url
    }

    /// File name of the source without its extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Lower-cased extension of the source file name.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Fingerprint identifying this request in the cache.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::fingerprint(self.width, self.height, self.source_url.as_str())
    }
}

fn parse_dimension(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u32>().ok().filter(|v| *v > 0)
}

fn parse_source_url(raw: &str) -> Result<Url, InvalidRequest> {
    let invalid = || InvalidRequest::InvalidUrl {
        url: raw.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid());
    }

    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Url::parse(&format!("http://{raw}")).map_err(|_| invalid()),
    }
}

fn split_file_name(url: &Url) -> Result<(String, String), InvalidRequest> {
    let missing = || InvalidRequest::MissingExtension {
        url: url.to_string(),
    };

    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .ok_or_else(missing)?;

    let (stem, extension) = file_name.rsplit_once('.').ok_or_else(missing)?;
    if extension.is_empty() || !extension.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(missing());
    }

    let stem = if stem.is_empty() { DEFAULT_STEM } else { stem };
    Ok((stem.to_string(), extension.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const MAX: u32 = 8192;

    #[test]
    fn test_parse_host_without_scheme() {
        let req = ImageRequest::parse("/fill/100/50/example.com/img/cat.jpg", None, MAX).unwrap();

        assert_eq!(req.width(), 100);
        assert_eq!(req.height(), 50);
        assert_eq!(req.source_url().as_str(), "http://example.com/img/cat.jpg");
        assert_eq!(req.stem(), "cat");
        assert_eq!(req.extension(), "jpg");
    }

    #[test]
    fn test_parse_keeps_explicit_https() {
        let req =
            ImageRequest::parse("/fill/10/20/https://example.com/a/b.PNG", None, MAX).unwrap();

        assert_eq!(req.source_url().scheme(), "https");
        assert_eq!(req.source_url().as_str(), "https://example.com/a/b.PNG");
        assert_eq!(req.extension(), "png");
    }

    #[test]
    fn test_parse_host_with_port() {
        let req = ImageRequest::parse("/fill/50/50/localhost:8088/img/gopher.jpg", None, MAX)
            .unwrap();

        assert_eq!(req.source_url().as_str(), "http://localhost:8088/img/gopher.jpg");
    }

    #[test]
    fn test_parse_appends_query() {
        let req =
            ImageRequest::parse("/fill/5/5/example.com/pic.webp", Some("v=2&s=1"), MAX).unwrap();

        assert_eq!(req.source_url().as_str(), "http://example.com/pic.webp?v=2&s=1");
        assert_eq!(req.extension(), "webp");
    }

    #[test]
    fn test_parse_uses_last_dot_for_extension() {
        let req = ImageRequest::parse("/fill/5/5/example.com/cat.tar.jpg", None, MAX).unwrap();

        assert_eq!(req.stem(), "cat.tar");
        assert_eq!(req.extension(), "jpg");
    }

    #[test]
    fn test_leading_zeros_normalize_to_same_key() {
        let a = ImageRequest::parse("/fill/050/007/example.com/cat.jpg", None, MAX).unwrap();
        let b = ImageRequest::parse("/fill/50/7/example.com/cat.jpg", None, MAX).unwrap();

        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_scheme_default_matches_explicit_http() {
        let a = ImageRequest::parse("/fill/1/1/example.com/cat.jpg", None, MAX).unwrap();
        let b = ImageRequest::parse("/fill/1/1/http://example.com/cat.jpg", None, MAX).unwrap();

        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test_case("/fill/100/50" ; "no_url")]
    #[test_case("/fill/100" ; "no_height")]
    #[test_case("/fill" ; "prefix_only")]
    fn test_missing_segments(path: &str) {
        assert!(matches!(
            ImageRequest::parse(path, None, MAX),
            Err(InvalidRequest::MissingSegments { .. })
        ));
    }

    #[test_case("abc" ; "alpha")]
    #[test_case("0" ; "zero")]
    #[test_case("-5" ; "negative")]
    #[test_case("+5" ; "explicit_plus")]
    #[test_case("" ; "empty")]
    #[test_case("99999999999" ; "overflow")]
    fn test_invalid_width(width: &str) {
        let path = format!("/fill/{width}/50/example.com/cat.jpg");
        assert!(matches!(
            ImageRequest::parse(&path, None, MAX),
            Err(InvalidRequest::InvalidWidth { .. })
        ));
    }

    #[test]
    fn test_invalid_height() {
        assert!(matches!(
            ImageRequest::parse("/fill/50/1.5/example.com/cat.jpg", None, MAX),
            Err(InvalidRequest::InvalidHeight { .. })
        ));
    }

    #[test]
    fn test_dimension_limit() {
        assert!(matches!(
            ImageRequest::parse("/fill/9000/50/example.com/cat.jpg", None, MAX),
            Err(InvalidRequest::DimensionTooLarge { max: MAX, .. })
        ));
    }

    #[test_case("/fill/1/1/" ; "empty_url")]
    #[test_case("/fill/1/1/exa mple.com/cat.jpg" ; "space_in_host")]
    #[test_case("/fill/1/1/[zz]/cat.jpg" ; "bad_ipv6_host")]
    fn test_invalid_url(path: &str) {
        assert!(matches!(
            ImageRequest::parse(path, None, MAX),
            Err(InvalidRequest::InvalidUrl { .. })
        ));
    }

    #[test_case("/fill/1/1/example.com/cat" ; "no_dot")]
    #[test_case("/fill/1/1/example.com/img/" ; "trailing_slash")]
    #[test_case("/fill/1/1/example.com/cat." ; "empty_extension")]
    fn test_missing_extension(path: &str) {
        assert!(matches!(
            ImageRequest::parse(path, None, MAX),
            Err(InvalidRequest::MissingExtension { .. })
        ));
    }

    #[test]
    fn test_extension_only_file_name_gets_default_stem() {
        let req = ImageRequest::parse("/fill/1/1/example.com/.png", None, MAX).unwrap();
        assert_eq!(req.stem(), DEFAULT_STEM);
    }
}
