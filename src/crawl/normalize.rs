// src/crawl/normalize.rs
// =============================================================================
// URL normalization.
//
// Every URL the crawler stores goes through `normalize` first:
// 1. Resolve it against the page it was found on (absolute, relative and
//    protocol-relative forms all work through Url::join)
// 2. Drop anything that isn't http:// or https:// (mailto:, javascript:,
//    data:, tel:, ...)
// 3. Strip the #fragment
//
// Page links additionally pass through `Scope`, which keeps the crawl on the
// start URL's host.
//
// Rust concepts:
// - Newtypes (PageUrl, ImageUrl): a plain Url can't be enqueued or
//   downloaded by mistake, only one that went through these functions
// - Option chaining: every "not a usable URL" case ends as None
// =============================================================================

use std::fmt;

use url::Url;

use crate::error::CrawlError;

/// A normalized, in-scope page address. Equality is string equality of the
/// normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageUrl(Url);

/// A normalized image address. Not scope-filtered: images are often served
/// from a CDN on another host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageUrl(Url);

impl PageUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl ImageUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// The set of hosts a crawl may visit: the start URL's host, plus the host
/// the start page redirected to, if any.
///
/// Scheme and port are ignored, so http/https variants of the same site
/// stay in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    hosts: Vec<String>,
}

impl Scope {
    pub fn of(start: &PageUrl) -> Self {
        let hosts = start.as_url().host_str().map(str::to_string).into_iter().collect();
        Self { hosts }
    }

    /// The start URL's host.
    pub fn host(&self) -> &str {
        self.hosts.first().map_or("", String::as_str)
    }

    /// Adds `url`'s host. Returns true if it wasn't in scope before.
    pub fn allow(&mut self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) if !self.contains(url) => {
                self.hosts.push(host.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, url: &Url) -> bool {
        url.host_str()
            .map_or(false, |host| self.hosts.iter().any(|allowed| allowed == host))
    }
}

/// Resolves `candidate` against `base` into an absolute, fragment-free
/// http(s) URL.
///
/// Returns None for empty input, unparseable input and non-HTTP schemes.
/// Pure: no network access.
pub fn normalize(base: &Url, candidate: &str) -> Option<Url> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    // join handles absolute, relative and //protocol-relative forms alike
    let mut url = base.join(candidate).ok()?;
    if !is_http(&url) {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Normalizes an anchor target and applies the same-host filter.
pub fn page_link(base: &Url, candidate: &str, scope: &Scope) -> Option<PageUrl> {
    normalize(base, candidate)
        .filter(|url| scope.contains(url))
        .map(PageUrl)
}

/// Normalizes an image source. `data:` URIs fall out here because they are
/// not http(s).
pub fn image_link(base: &Url, candidate: &str) -> Option<ImageUrl> {
    normalize(base, candidate).map(ImageUrl)
}

/// Parses the user-supplied start URL.
///
/// Bare hosts like `example.com` get `https://` in front. The result must be
/// http(s) and have a host, otherwise the run cannot start.
pub fn parse_start_url(raw: &str) -> Result<PageUrl, CrawlError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| CrawlError::InvalidStartUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("URL is empty"));
    }

    let has_http_prefix = trimmed
        .get(..4)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("http"));
    let with_scheme = if has_http_prefix {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(invalid("only http and https URLs can be crawled"));
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
    if !is_http(&url) {
        return Err(invalid("only http and https URLs can be crawled"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("URL has no host"));
    }
    url.set_fragment(None);
    Ok(PageUrl(url))
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
