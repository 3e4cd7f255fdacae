// src/crawl/extract.rs
// =============================================================================
// This module pulls page links and image sources out of HTML.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Never fails on broken markup (html5ever recovers like a browser does)
// - Supports CSS selectors for finding elements
//
// Lazy-loaded images keep their real address in a data-* attribute. Which
// attributes we look at, and in what order, is the IMAGE_SOURCE_ATTRS list.
//
// Rust concepts:
// - LazyLock: the CSS selectors are parsed once, on first use
// - Trait with `?Sized`: image_source works on a DOM element or any other
//   attribute source
// =============================================================================

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::crawl::normalize::{image_link, page_link, ImageUrl, PageUrl, Scope};

/// Attributes holding an image address, highest priority first.
pub const IMAGE_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-lazyload"];

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href], area[href]").expect("static selector"));
static IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector"));

/// Anything we can ask for an attribute value by name.
pub trait AttributeLookup {
    fn attribute(&self, name: &str) -> Option<&str>;
}

impl AttributeLookup for scraper::node::Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attr(name)
    }
}

/// Links and images found on one page. Both are sets, order is meaningless.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub links: HashSet<PageUrl>,
    pub images: HashSet<ImageUrl>,
}

// Parses `html` and returns in-scope page links plus every image address
//
// Parameters:
//   html: Raw page body (bytes that aren't valid UTF-8 are replaced)
//   base: The page's final URL, for resolving relative addresses
//   scope: Hosts whose links count as pages of this site
//
// Returns: Two sets; duplicates on the page collapse on their own
pub fn extract(html: &[u8], base: &Url, scope: &Scope) -> Extraction {
    let text = String::from_utf8_lossy(html);
    // Broken markup still produces a document, never an error
    let document = Html::parse_document(&text);

    // <a href> and <area href>, normalized and kept on-site
    let links = document
        .select(&LINK_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| page_link(base, href, scope))
        .collect();

    // <img>, reading whichever source attribute is set first
    let images = document
        .select(&IMAGE_SELECTOR)
        .filter_map(|element| image_source(element.value()))
        .filter_map(|src| image_link(base, src))
        .collect();

    Extraction { links, images }
}

/// First usable value among IMAGE_SOURCE_ATTRS.
///
/// Inline `data:` placeholders are treated as empty, so a lazy-loading
/// `<img src="data:..." data-src="real.jpg">` yields `real.jpg`.
pub fn image_source<E: AttributeLookup + ?Sized>(element: &E) -> Option<&str> {
    IMAGE_SOURCE_ATTRS
        .iter()
        .filter_map(|name| element.attribute(name))
        .map(str::trim)
        .find(|value| !value.is_empty() && !is_inline_data(value))
}

fn is_inline_data(value: &str) -> bool {
    value
        .get(..5)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("data:"))
}
