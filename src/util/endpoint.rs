use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors from validating a classification endpoint.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The URL string could not be parsed.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Plain HTTP to a non-loopback host would send the API key in clear text.
    #[error("Insecure endpoint: HTTPS required (except loopback for testing): {0}")]
    Insecure(String),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Validates a chat-completions endpoint before any credential is sent to it.
///
/// Accepts `https://` URLs, and `http://` only when the host is `localhost` or a
/// loopback address (mock servers in tests).
///
/// # Examples
///
/// ```
/// use xfeed::util::validate_endpoint;
///
/// assert!(validate_endpoint("https://api.openai.com/v1/chat/completions").is_ok());
/// assert!(validate_endpoint("http://127.0.0.1:8080/v1/chat/completions").is_ok());
/// assert!(validate_endpoint("http://api.example.com/v1/chat/completions").is_err());
/// assert!(validate_endpoint("file:///etc/passwd").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback_host(&url) => {
            tracing::warn!(endpoint = %url, "Using non-HTTPS classification endpoint (loopback only)");
            Ok(url)
        }
        "http" => Err(EndpointError::Insecure(url.to_string())),
        scheme => Err(EndpointError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_endpoint("https://api.deepseek.com/v1/chat/completions").unwrap();
        assert_eq!(url.host_str(), Some("api.deepseek.com"));
    }

    #[test]
    fn test_loopback_http_accepted() {
        assert!(validate_endpoint("http://localhost:9000/v1").is_ok());
        assert!(validate_endpoint("http://127.0.0.1:9000/v1").is_ok());
        assert!(validate_endpoint("http://[::1]:9000/v1").is_ok());
    }

    #[test]
    fn test_plain_http_rejected() {
        let err = validate_endpoint("http://api.openai.com/v1/chat/completions").unwrap_err();
        assert!(matches!(err, EndpointError::Insecure(_)));
        assert!(validate_endpoint("http://192.168.1.10/v1").is_err());
    }

    #[test]
    fn test_lookalike_localhost_rejected() {
        assert!(validate_endpoint("http://localhost.evil.com/v1").is_err());
        assert!(validate_endpoint("http://127.0.0.1.evil.com/v1").is_err());
    }

    #[test]
    fn test_bad_scheme_and_garbage() {
        assert!(matches!(
            validate_endpoint("ftp://example.com").unwrap_err(),
            EndpointError::UnsupportedScheme(_)
        ));
        assert!(matches!(
            validate_endpoint("not a url").unwrap_err(),
            EndpointError::InvalidUrl(_)
        ));
    }
}
