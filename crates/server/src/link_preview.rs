// crates/server/src/link_preview.rs
//! Title and category inference for media created from a pasted link.

use std::sync::OnceLock;
use std::time::Duration;

use regex_lite::Regex;
use reqwest::Url;

/// Only the head of a page is needed to find its title.
const MAX_HTML_BYTES: usize = 512 * 1024;

/// Parse `raw` as an absolute http(s) URL.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https")
        .then_some(url)
        .filter(|u| u.host_str().is_some())
}

/// Media category implied by the link's host, if any.
pub fn category_for(url: &Url) -> Option<&'static str> {
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let path = url.path();
    let on = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if on("themoviedb.org") || on("trakt.tv") {
        if path.starts_with("/tv") || path.starts_with("/shows") {
            return Some("Series");
        }
        return Some("Movies");
    }
    if on("imdb.com") || on("letterboxd.com") {
        return Some("Movies");
    }
    if on("tvmaze.com") || on("serializd.com") {
        return Some("Series");
    }
    if on("goodreads.com") || on("openlibrary.org") || on("books.google.com") {
        return Some("Books");
    }
    if on("store.steampowered.com") || on("igdb.com") || on("backloggd.com") {
        return Some("Games");
    }
    if on("youtube.com") || on("youtu.be") || on("vimeo.com") {
        return Some("Videos");
    }
    if on("podcasts.apple.com") || (on("open.spotify.com") && path.starts_with("/show")) {
        return Some("Podcasts");
    }
    None
}

fn og_title_regexes() -> &'static [Option<Regex>; 2] {
    static OG_TITLE: OnceLock<[Option<Regex>; 2]> = OnceLock::new();
    OG_TITLE.get_or_init(|| {
        [
            Regex::new(r#"(?i)<meta[^>]+property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']*)["']"#).ok(),
            Regex::new(r#"(?i)<meta[^>]+content\s*=\s*["']([^"']*)["'][^>]*property\s*=\s*["']og:title["']"#).ok(),
        ]
    })
}

/// `og:title`, else `<title>`, HTML entities decoded.
pub fn extract_title(html: &str) -> Option<String> {
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();

    let og = og_title_regexes()
        .iter()
        .flatten()
        .find_map(|re| re.captures(html).map(|c| c[1].to_string()));
    let title = og.or_else(|| {
        TITLE
            .get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok())
            .as_ref()
            .and_then(|re| re.captures(html))
            .map(|c| c[1].to_string())
    })?;

    let title = decode_entities(title.split_whitespace().collect::<Vec<_>>().join(" ").as_str());
    (!title.is_empty()).then_some(title)
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Fetch the page and extract its title. Any failure yields `None`.
pub async fn fetch_title(http: &reqwest::Client, url: &Url, timeout: Duration) -> Option<String> {
    let started = std::time::Instant::now();
    let response = match http
        .get(url.clone())
        .header("Accept", "text/html,application/xhtml+xml")
        .timeout(timeout)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            crate::metrics::record_upstream("link_preview", r.status().as_str(), started.elapsed());
            tracing::debug!(url = %url, status = %r.status(), "Link preview returned non-success");
            return None;
        }
        Err(e) => {
            crate::metrics::record_upstream("link_preview", "error", started.elapsed());
            tracing::debug!(url = %url, error = %e, "Link preview fetch failed");
            return None;
        }
    };
    crate::metrics::record_upstream("link_preview", "200", started.elapsed());

    let head = read_head(response, MAX_HTML_BYTES).await;
    extract_title(&String::from_utf8_lossy(&head))
}

/// Read at most `limit` bytes of the body, dropping the rest unread.
async fn read_head(mut response: reqwest::Response, limit: usize) -> Vec<u8> {
    let mut head = Vec::new();
    while head.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - head.len());
                head.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Link preview body read failed");
                break;
            }
        }
    }
    head
}
