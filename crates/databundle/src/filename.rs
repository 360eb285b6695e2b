//! Work out the local filename for a download.
//!
//! The last URL path segment is the default; a `Content-Disposition` header with a
//! filename parameter overrides it. Directory components are always stripped so the
//! name cannot escape the download directory.

use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use url::Url;

use crate::error::MirrorError;

pub fn resolve(headers: &HeaderMap, url: &Url) -> Result<String, MirrorError> {
    let from_header = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename);

    let candidate = match from_header {
        Some(name) => name,
        None => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
    };

    sanitize(&candidate).ok_or_else(|| MirrorError::AmbiguousFilename {
        url: url.to_string(),
    })
}

/// Keep only the final path component. `None` if nothing usable is left.
pub fn sanitize(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}

/// Extract the filename parameter from a `Content-Disposition` value.
///
/// `filename*` (RFC 5987) wins over `filename` when both are present.
pub fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(value).into_iter().skip(1) {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let val = unquote(val.trim());
        match key.as_str() {
            "filename*" => extended = decode_ext_value(&val),
            "filename" => plain = Some(val),
            _ => {}
        }
    }

    extended.or(plain)
}

fn split_params(value: &str) -> Vec<&str> {
    let mut out = vec![];
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                out.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&value[start..]);
    out
}

fn unquote(val: &str) -> String {
    let Some(inner) = val
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return val.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

// charset'language'percent-encoded-value
fn decode_ext_value(val: &str) -> Option<String> {
    let mut parts = val.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let decoded = percent_decode_str(encoded);
    if charset.eq_ignore_ascii_case("utf-8") {
        decoded.decode_utf8().ok().map(|s| s.into_owned())
    } else {
        Some(decoded.decode_utf8_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn with_disposition(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn defaults_to_last_url_segment() {
        let name = resolve(
            &HeaderMap::new(),
            &url("https://github.com/org/data/archive/r20200101.zip?raw=1"),
        )
        .unwrap();
        assert_eq!(name, "r20200101.zip");
    }

    #[test]
    fn header_overrides_url() {
        let headers = with_disposition(r#"attachment; filename="data_testing.zip""#);
        let name = resolve(&headers, &url("https://osf.io/download/abc12/")).unwrap();
        assert_eq!(name, "data_testing.zip");
    }

    #[test]
    fn header_without_filename_falls_back_to_url() {
        let headers = with_disposition("inline");
        let name = resolve(&headers, &url("https://example.org/x/bundle.tgz")).unwrap();
        assert_eq!(name, "bundle.tgz");
    }

    #[test]
    fn extended_filename_is_preferred_and_decoded() {
        let headers = with_disposition(
            r#"attachment; filename="fallback.zip"; filename*=UTF-8''d%C3%A9j%C3%A0.zip"#,
        );
        let name = resolve(&headers, &url("https://example.org/get")).unwrap();
        assert_eq!(name, "déjà.zip");
    }

    #[test]
    fn quoted_semicolons_do_not_split_params() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="a;b.zip"; size=10"#).as_deref(),
            Some("a;b.zip")
        );
    }

    #[test]
    fn traversal_is_stripped() {
        let headers = with_disposition(r#"attachment; filename="../../etc/passwd.zip""#);
        let name = resolve(&headers, &url("https://example.org/get")).unwrap();
        assert_eq!(name, "passwd.zip");

        assert_eq!(sanitize("/abs/path/x.tar.gz").as_deref(), Some("x.tar.gz"));
        assert_eq!(sanitize(r"..\..\win.zip").as_deref(), Some("win.zip"));
        assert_eq!(sanitize(".."), None);
        assert_eq!(sanitize("dir/"), None);
    }

    #[test]
    fn index_page_is_ambiguous() {
        let err = resolve(&HeaderMap::new(), &url("https://osf.io/ugscu/")).unwrap_err();
        assert!(matches!(err, MirrorError::AmbiguousFilename { .. }));

        let err = resolve(&HeaderMap::new(), &url("https://example.org")).unwrap_err();
        assert!(matches!(err, MirrorError::AmbiguousFilename { .. }));
    }
}
