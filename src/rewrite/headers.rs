//! `Set-Cookie` and `Location` rewriting.
//!
//! Cookies are always scanned: a `domain=<target host>` attribute is pointed
//! at the proxy host, while cookies without a domain already scope to the
//! proxy and stay as they are. `Location` is only touched when it refers to
//! the target host, so relative or foreign redirects pass through.

use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use url::Url;

use crate::rewrite::RewriteContext;

/// Rewrite every `Set-Cookie` line and the `Location` header in place.
pub fn rewrite_response_headers(headers: &mut HeaderMap, ctx: &RewriteContext) {
    let cookies: Vec<HeaderValue> = headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|cookie| rewrite_set_cookie(cookie, ctx))
                .and_then(|cookie| HeaderValue::from_str(&cookie).ok())
                .unwrap_or_else(|| value.clone())
        })
        .collect();
    if !cookies.is_empty() {
        headers.remove(SET_COOKIE);
        for cookie in cookies {
            headers.append(SET_COOKIE, cookie);
        }
    }

    let location = headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|location| rewrite_location(location, ctx))
        .and_then(|location| HeaderValue::from_str(&location).ok());
    if let Some(location) = location {
        tracing::debug!(location = ?location, "Rewrote Location header");
        headers.insert(LOCATION, location);
    }
}

/// Replace each case-insensitive `domain=<target host>` with the proxy host.
///
/// Returns `None` when nothing changed.
pub fn rewrite_set_cookie(cookie: &str, ctx: &RewriteContext) -> Option<String> {
    const ATTR: &str = "domain=";

    let lowered = cookie.to_ascii_lowercase();
    let target = ctx.target_host().to_ascii_lowercase();
    let mut out = String::with_capacity(cookie.len());
    let mut copied = 0;
    let mut search = 0;

    while let Some(found) = lowered[search..].find(ATTR) {
        let value_start = search + found + ATTR.len();
        search = value_start;

        // A leading dot is legacy syntax for the same domain.
        let host_start = if lowered[value_start..].starts_with('.') {
            value_start + 1
        } else {
            value_start
        };
        let Some(rest) = lowered[host_start..].strip_prefix(target.as_str()) else {
            continue;
        };
        if !(rest.is_empty() || rest.starts_with([';', ' ', '\t'])) {
            continue;
        }

        let host_end = host_start + target.len();
        out.push_str(&cookie[copied..value_start]);
        out.push_str(ctx.proxy_host());
        copied = host_end;
        search = host_end;
    }

    if copied == 0 {
        return None;
    }
    out.push_str(&cookie[copied..]);
    Some(out)
}

/// Point an absolute (or protocol-relative) redirect at the target host back
/// through the proxy. Returns `None` when the header should stay unchanged.
pub fn rewrite_location(location: &str, ctx: &RewriteContext) -> Option<String> {
    if let Some(rewritten) = ctx.replace_target_origin(location) {
        return Some(rewritten);
    }

    let absolute = if location.starts_with("//") {
        Url::parse(&format!("{}:{}", ctx.target_scheme, location)).ok()?
    } else {
        Url::parse(location).ok()?
    };
    if !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }
    if !absolute
        .host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(ctx.target_host()))
    {
        return None;
    }

    let mut rewritten = ctx.proxied_base();
    rewritten.push_str(absolute.path());
    if let Some(query) = absolute.query() {
        rewritten.push('?');
        rewritten.push_str(query);
    }
    if let Some(fragment) = absolute.fragment() {
        rewritten.push('#');
        rewritten.push_str(fragment);
    }
    Some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::test_support::{context, default_route_context};

    #[test]
    fn cookie_domain_is_replaced_case_insensitively() {
        let ctx = context();
        assert_eq!(
            rewrite_set_cookie("session=abc; domain=target.example.com", &ctx).as_deref(),
            Some("session=abc; domain=proxy.example.com")
        );
        assert_eq!(
            rewrite_set_cookie("session=abc; Path=/; Domain=TARGET.example.com; Secure", &ctx).as_deref(),
            Some("session=abc; Path=/; Domain=proxy.example.com; Secure")
        );
        assert_eq!(
            rewrite_set_cookie("id=1; domain=.target.example.com", &ctx).as_deref(),
            Some("id=1; domain=proxy.example.com")
        );
    }

    #[test]
    fn cookie_without_domain_is_untouched() {
        let ctx = context();
        assert_eq!(rewrite_set_cookie("session=abc; Path=/; HttpOnly", &ctx), None);
    }

    #[test]
    fn cookie_for_other_domain_is_untouched() {
        let ctx = context();
        assert_eq!(rewrite_set_cookie("a=1; domain=other.example.com", &ctx), None);
        assert_eq!(rewrite_set_cookie("a=1; domain=target.example.com.evil", &ctx), None);
    }

    #[test]
    fn location_with_target_origin_goes_through_proxy() {
        let ctx = context();
        assert_eq!(
            rewrite_location("https://target.example.com/login", &ctx).as_deref(),
            Some("https://proxy.example.com/p/login")
        );
        assert_eq!(
            rewrite_location("http://TARGET.example.com/a?b=1#c", &ctx).as_deref(),
            Some("https://proxy.example.com/p/a?b=1#c")
        );
        assert_eq!(
            rewrite_location("//target.example.com/next", &ctx).as_deref(),
            Some("https://proxy.example.com/p/next")
        );
    }

    #[test]
    fn location_elsewhere_is_untouched() {
        let ctx = context();
        assert_eq!(rewrite_location("/relative/path", &ctx), None);
        assert_eq!(rewrite_location("https://sso.example.net/login", &ctx), None);
        assert_eq!(rewrite_location("next", &ctx), None);
    }

    #[test]
    fn default_route_location_has_no_prefix() {
        let ctx = default_route_context();
        assert_eq!(
            rewrite_location("https://target.example.com/login", &ctx).as_deref(),
            Some("https://proxy.example.com/login")
        );
    }

    #[test]
    fn rewrites_header_map_in_place() {
        let ctx = context();
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1; domain=target.example.com"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2; Path=/"));
        headers.insert(LOCATION, HeaderValue::from_static("https://target.example.com/home"));
        headers.insert("x-other", HeaderValue::from_static("domain=target.example.com"));

        rewrite_response_headers(&mut headers, &ctx);

        let cookies: Vec<_> = headers.get_all(SET_COOKIE).iter().map(|v| v.to_str().unwrap()).collect();
        assert_eq!(cookies, ["a=1; domain=proxy.example.com", "b=2; Path=/"]);
        assert_eq!(headers[LOCATION], "https://proxy.example.com/p/home");
        assert_eq!(headers["x-other"], "domain=target.example.com");
    }
}
