//! Normalisation of caller-supplied calendar URLs.

use url::Url;

use crate::error::FetchError;

/// Turn a caller-supplied address into an http(s) URL.
///
/// Accepts addresses percent-encoded as a whole (`webcal%3A%2F%2F...`) and
/// rewrites the `webcal` scheme to `http`.
pub fn normalize_url(raw: &str) -> Result<Url, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FetchError::InvalidUrl(String::new()));
    }

    let decoded = if !raw.contains("://") && raw.contains('%') {
        urlencoding::decode(raw)
            .map_err(|_| FetchError::InvalidUrl(raw.to_string()))?
            .into_owned()
    } else {
        raw.to_string()
    };

    let rewritten = match decoded.get(.."webcal:".len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case("webcal:") => {
            format!("http:{}", &decoded["webcal:".len()..])
        }
        _ => decoded,
    };

    let url = Url::parse(&rewritten).map_err(|_| FetchError::InvalidUrl(rewritten.clone()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(FetchError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::InvalidUrl(rewritten));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webcal_becomes_http() {
        let url = normalize_url("webcal://alpaca-racing.com/schedule?team=1").unwrap();
        assert_eq!(url.as_str(), "http://alpaca-racing.com/schedule?team=1");

        let url = normalize_url("WEBCAL://alpaca-racing.com/schedule").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_http_and_https_pass_through() {
        assert_eq!(
            normalize_url("https://alpaca-racing.com/schedule").unwrap().as_str(),
            "https://alpaca-racing.com/schedule"
        );
        assert_eq!(
            normalize_url("http://10.0.0.1:8080/cal.ics").unwrap().port(),
            Some(8080)
        );
    }

    #[test]
    fn test_percent_encoded_url_is_decoded() {
        let url = normalize_url("webcal%3A%2F%2Falpaca-racing.com%2Fschedule").unwrap();
        assert_eq!(url.as_str(), "http://alpaca-racing.com/schedule");
    }

    #[test]
    fn test_other_schemes_are_rejected() {
        match normalize_url("ftp://alpaca-racing.com/schedule") {
            Err(FetchError::UnsupportedScheme(scheme)) => assert_eq!(scheme, "ftp"),
            other => panic!("Expected UnsupportedScheme, got {:?}", other),
        }
        assert!(matches!(
            normalize_url("file:///etc/passwd"),
            Err(FetchError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_garbage_is_invalid() {
        for raw in ["", "not a url", "http://", "/relative/path"] {
            assert!(
                matches!(normalize_url(raw), Err(FetchError::InvalidUrl(_))),
                "{raw:?} should be invalid"
            );
        }
    }
}
