//! Upstream targets and path merging.

use url::Url;

/// Reasons a configured target URL is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("not a valid URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0:?}, expected http or https")]
    Scheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("URL must not carry credentials")]
    Credentials,
}

/// An upstream origin (scheme + host) plus an optional base path.
///
/// Parsed once from configuration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
}

impl Target {
    /// Parse an absolute `http`/`https` URL.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let url = Url::parse(raw)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(TargetError::Scheme(other.to_string())),
        }
        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(TargetError::MissingHost),
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(TargetError::Credentials);
        }
        Ok(Self { url })
    }

    /// Build a target from a bare host segment (passthrough routing).
    ///
    /// Returns `None` unless `segment` is exactly a host with an optional port.
    /// An explicit default port (`example.com:443` under https) is accepted.
    pub fn for_host(scheme: &str, segment: &str) -> Option<Self> {
        let target = Self::parse(&format!("{scheme}://{segment}")).ok()?;
        let url = &target.url;
        let exact = url.path() == "/" && url.query().is_none() && url.fragment().is_none();
        let host = url.host_str()?;
        let bare_host = url.port().is_none() && host.eq_ignore_ascii_case(segment);
        let with_port = url
            .port_or_known_default()
            .is_some_and(|port| format!("{host}:{port}").eq_ignore_ascii_case(segment));
        (exact && (bare_host || with_port)).then_some(target)
    }

    /// `scheme://host[:port]`, default ports omitted.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Host name without port.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Host name with the port when it is not the scheme default.
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Path component of the configured URL, `/` when none was given.
    pub fn base_path(&self) -> &str {
        self.url.path()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Merge the request sub-path into a target's base path.
///
/// Root access (`sub_path == "/"`) returns the base path verbatim so that a
/// target pointing at a single resource is not suffixed with a slash.
pub fn merge_path(base_path: &str, sub_path: &str) -> String {
    if sub_path == "/" {
        return base_path.to_string();
    }
    let base = base_path.strip_suffix('/').unwrap_or(base_path);
    format!("{base}{sub_path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_origin_and_base_path() {
        let target = Target::parse("https://tv.example.org/epgphp/index.php").unwrap();
        assert_eq!(target.origin(), "https://tv.example.org");
        assert_eq!(target.host(), "tv.example.org");
        assert_eq!(target.base_path(), "/epgphp/index.php");

        let bare = Target::parse("https://www.google.com").unwrap();
        assert_eq!(bare.base_path(), "/");
    }

    #[test]
    fn authority_keeps_non_default_port() {
        let target = Target::parse("http://127.0.0.1:3000/app").unwrap();
        assert_eq!(target.origin(), "http://127.0.0.1:3000");
        assert_eq!(target.authority(), "127.0.0.1:3000");
        assert_eq!(target.host(), "127.0.0.1");

        let default_port = Target::parse("https://example.com:443").unwrap();
        assert_eq!(default_port.authority(), "example.com");
    }

    #[test]
    fn rejects_non_http_targets() {
        assert!(matches!(Target::parse("ftp://example.com"), Err(TargetError::Scheme(_))));
        assert!(matches!(Target::parse("not a url"), Err(TargetError::Parse(_))));
        assert!(matches!(Target::parse("https://user:pw@example.com"), Err(TargetError::Credentials)));
    }

    #[test]
    fn host_segment_targets() {
        let target = Target::for_host("https", "example.com").unwrap();
        assert_eq!(target.origin(), "https://example.com");
        assert!(Target::for_host("https", "example.com:8443").is_some());
        assert!(Target::for_host("https", "user@example.com").is_none());
        assert!(Target::for_host("https", "bad host").is_none());
    }

    #[test]
    fn host_segment_with_default_port() {
        let secure = Target::for_host("https", "example.com:443").unwrap();
        assert_eq!(secure.origin(), "https://example.com");
        assert_eq!(secure.authority(), "example.com");
        assert!(Target::for_host("http", "example.com:80").is_some());
        assert!(Target::for_host("http", "example.com:443").is_some());
        assert!(Target::for_host("https", "example.com:").is_none());
    }

    #[test]
    fn merge_root_access_keeps_file_path() {
        assert_eq!(merge_path("/epgphp/index.php", "/"), "/epgphp/index.php");
        assert_eq!(merge_path("/", "/"), "/");
    }

    #[test]
    fn merge_appends_sub_path() {
        assert_eq!(merge_path("/", "/x/y"), "/x/y");
        assert_eq!(merge_path("/base/", "/x/y"), "/base/x/y");
        assert_eq!(merge_path("/base", "/x/y"), "/base/x/y");
    }
}
