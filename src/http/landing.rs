//! Landing page served when no route matches.

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::RoutingMode;
use crate::routing::RouteTable;

/// Render the route listing.
pub fn render(routes: &RouteTable) -> String {
    let mut html = String::from(concat!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
        "<title>Proxy routes</title>\n</head>\n<body>\n<h1>Proxy routes</h1>\n",
    ));

    match routes.mode() {
        RoutingMode::Table => {
            html.push_str("<ul>\n");
            for (prefix, target) in routes.routes() {
                let prefix = escape(prefix);
                html.push_str(&format!(
                    "<li><a href=\"/{prefix}/\">/{prefix}/</a> &rarr; {}</li>\n",
                    escape(&target.to_string())
                ));
            }
            html.push_str("</ul>\n");
        }
        RoutingMode::Passthrough => {
            html.push_str("<p>Request <code>/&lt;host&gt;/&lt;path&gt;</code> to reach <code>&lt;host&gt;</code> through this proxy.</p>\n");
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// `200 OK` with the rendered page.
pub fn response(routes: &RouteTable) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
        render(routes),
    )
        .into_response()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Target;
    use std::collections::BTreeMap;

    #[test]
    fn lists_every_prefix() {
        let mut routes = BTreeMap::new();
        routes.insert("google".to_string(), Target::parse("https://www.google.com").unwrap());
        routes.insert("epg".to_string(), Target::parse("https://tv.example.org/epgphp/index.php").unwrap());
        let page = render(&RouteTable::new(routes, None));

        assert!(page.contains(r#"<a href="/google/">/google/</a>"#));
        assert!(page.contains(r#"<a href="/epg/">/epg/</a> &rarr; https://tv.example.org/epgphp/index.php"#));
        assert!(page.find("/epg/").unwrap() < page.find("/google/").unwrap());
    }

    #[test]
    fn escapes_targets() {
        let mut routes = BTreeMap::new();
        routes.insert("q".to_string(), Target::parse("https://example.com/?a=1&b=<2>").unwrap());
        let page = render(&RouteTable::new(routes, None));
        assert!(page.contains("a=1&amp;b="));
        assert!(!page.contains("<2>"));
    }

    #[test]
    fn passthrough_page_explains_usage() {
        let page = render(&RouteTable::passthrough("https", None));
        assert!(page.contains("/&lt;host&gt;/&lt;path&gt;"));
        assert!(!page.contains("<ul>"));
    }

    #[test]
    fn response_is_html_ok() {
        let response = response(&RouteTable::new(BTreeMap::new(), None));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    }
}
