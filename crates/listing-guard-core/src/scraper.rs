//! Fetching a listing page and pulling out the fields the scan needs.
//!
//! Extraction is heuristic: each field walks an ordered list of selectors and
//! keeps the first non-empty hit. Missing fields come back as empty strings.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use ::scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedListing {
    pub title: String,
    pub description: String,
    pub price: String,
    pub seller_info: String,
    pub image_url: String,
}

/// Fetches listing pages with a browser-like client.
#[derive(Debug, Clone)]
pub struct ListingScraper {
    client: reqwest::Client,
}

impl ListingScraper {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to create scraper HTTP client")?;
        Ok(Self { client })
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn scrape(&self, url: &Url) -> Result<ScrapedListing> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "failed to fetch URL: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
        }

        let html = response
            .text()
            .await
            .context("failed to read listing page body")?;
        let listing = extract_listing(&html, url);
        debug!(
            has_title = !listing.title.is_empty(),
            has_price = !listing.price.is_empty(),
            has_image = !listing.image_url.is_empty(),
            "listing page scraped"
        );
        Ok(listing)
    }
}

static WHITESPACE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s+").ok());
static PRICE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\$\s?[\d,]+\.?\d*").ok());

const PRICE_SELECTORS: &[&str] = &[
    ".price",
    "[itemprop=\"price\"]",
    ".product-price",
    ".offer-price",
    ".current-price",
    ".sale-price",
    ".product__price",
    ".product-meta__price",
];

const SELLER_SELECTORS: &[&str] = &[
    ".seller-info",
    ".merchant-info",
    "[itemprop=\"seller\"]",
    ".vendor",
    ".store-name",
    ".sold-by",
];

fn collapse_whitespace(text: &str) -> String {
    match WHITESPACE_RE.as_ref() {
        Some(re) => re.replace_all(text, " ").trim().to_string(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

fn select_all<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn attr(document: &Html, selector: &str, name: &str) -> Option<String> {
    select_all(document, selector)
        .into_iter()
        .find_map(|el| el.value().attr(name).map(collapse_whitespace))
        .filter(|value| !value.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    select_all(document, selector)
        .into_iter()
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn meta(document: &Html, key: &str, value: &str) -> Option<String> {
    attr(document, &format!("meta[{key}=\"{value}\"]"), "content")
}

fn extract_title(document: &Html) -> Option<String> {
    meta(document, "property", "og:title")
        .or_else(|| meta(document, "name", "twitter:title"))
        .or_else(|| first_text(document, "title"))
        .or_else(|| first_text(document, "h1"))
}

fn extract_description(document: &Html) -> Option<String> {
    meta(document, "property", "og:description")
        .or_else(|| meta(document, "name", "description"))
        .or_else(|| meta(document, "name", "twitter:description"))
        .or_else(|| first_text(document, "p"))
}

fn extract_price(document: &Html) -> Option<String> {
    PRICE_SELECTORS
        .iter()
        .find_map(|selector| first_text(document, selector))
        .or_else(|| {
            select_all(document, "span")
                .into_iter()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .find(|text| text.contains('$'))
        })
        .or_else(|| {
            let body = first_text(document, "body")?;
            PRICE_RE
                .as_ref()?
                .find(&body)
                .map(|m| m.as_str().to_string())
        })
}

fn extract_seller(document: &Html) -> Option<String> {
    SELLER_SELECTORS
        .iter()
        .find_map(|selector| first_text(document, selector))
}

fn extract_image(document: &Html, page_url: &Url) -> Option<String> {
    let raw = meta(document, "property", "og:image")
        .or_else(|| meta(document, "name", "twitter:image"))
        .or_else(|| attr(document, "img[itemprop=\"image\"]", "src"))
        .or_else(|| attr(document, ".product-image img", "src"))
        .or_else(|| attr(document, "img", "src"))?;
    Some(
        page_url
            .join(&raw)
            .map(|absolute| absolute.to_string())
            .unwrap_or(raw),
    )
}

/// Pull listing fields out of an HTML page. Relative image URLs are resolved against `page_url`.
pub fn extract_listing(html: &str, page_url: &Url) -> ScrapedListing {
    let document = Html::parse_document(html);
    ScrapedListing {
        title: extract_title(&document).unwrap_or_default(),
        description: extract_description(&document).unwrap_or_default(),
        price: extract_price(&document).unwrap_or_default(),
        seller_info: extract_seller(&document).unwrap_or_default(),
        image_url: extract_image(&document, page_url).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://market.example/items/42").unwrap()
    }

    #[test]
    fn prefers_open_graph_metadata() {
        let html = r#"
            <html><head>
              <title>Fallback title</title>
              <meta property="og:title" content="2020 Honda CBR600RR">
              <meta property="og:description" content="Low miles,
                  garage kept.">
              <meta property="og:image" content="/images/cbr.jpg">
            </head>
            <body>
              <h1>Heading</h1>
              <div class="price"> $ 3,000 </div>
              <div class="seller-info">Joined
                 last week</div>
            </body></html>
        "#;

        let listing = extract_listing(html, &page_url());
        assert_eq!(listing.title, "2020 Honda CBR600RR");
        assert_eq!(listing.description, "Low miles, garage kept.");
        assert_eq!(listing.price, "$ 3,000");
        assert_eq!(listing.seller_info, "Joined last week");
        assert_eq!(listing.image_url, "https://market.example/images/cbr.jpg");
    }

    #[test]
    fn falls_back_through_selectors() {
        let html = r#"
            <html><head><title>  Leather   sofa </title></head>
            <body>
              <p>Barely used, pickup only.</p>
              <span>Free delivery</span><span>Now $450</span>
              <img src="https://cdn.example/sofa.png">
            </body></html>
        "#;

        let listing = extract_listing(html, &page_url());
        assert_eq!(listing.title, "Leather sofa");
        assert_eq!(listing.description, "Barely used, pickup only.");
        assert_eq!(listing.price, "Now $450");
        assert_eq!(listing.seller_info, "");
        assert_eq!(listing.image_url, "https://cdn.example/sofa.png");
    }

    #[test]
    fn price_regex_scans_body_text() {
        let html = "<html><body><div>Asking $1,250.00 or best offer</div></body></html>";
        let listing = extract_listing(html, &page_url());
        assert_eq!(listing.price, "$1,250.00");
    }

    #[test]
    fn empty_page_yields_empty_fields() {
        let listing = extract_listing("<html></html>", &page_url());
        assert_eq!(listing, ScrapedListing::default());
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(ScrapedListing {
            seller_info: "Verified".into(),
            image_url: "https://img".into(),
            ..ScrapedListing::default()
        })
        .unwrap();
        assert_eq!(value["sellerInfo"], "Verified");
        assert_eq!(value["imageUrl"], "https://img");
    }
}
