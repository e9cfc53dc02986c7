use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{parse_price, ListingQuote, PriceQuery, PriceSource};
use crate::scanner::Category;

pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Live product search over a JSON endpoint.
///
/// Issues `GET {endpoint}?q=<keywords>&category=<category>` and expects an
/// array of `{title, price, url, trusted?}` objects.
#[derive(Debug, Clone)]
pub struct ProductSearchSource {
    http: Client,
    endpoint: String,
}

impl ProductSearchSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            bail!("product search endpoint must not be empty");
        }
        let http = Client::builder()
            .user_agent(concat!("listing-guard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build product search HTTP client")?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl PriceSource for ProductSearchSource {
    fn name(&self) -> &str {
        "product-search"
    }

    fn supports(&self, _category: Category) -> bool {
        true
    }

    async fn search(&self, query: &PriceQuery) -> Result<Vec<ListingQuote>> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query.keywords.as_str()),
                ("category", query.category.as_str()),
            ])
            .send()
            .await
            .context("failed to call product search endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("product search error ({}): {}", status, body);
        }

        let items: Vec<SearchItem> = response
            .json()
            .await
            .context("failed to parse product search response")?;

        Ok(items.into_iter().map(SearchItem::into_quote).collect())
    }
}

#[derive(Deserialize)]
struct SearchItem {
    title: String,
    price: RawPrice,
    #[serde(default)]
    url: String,
    #[serde(default)]
    trusted: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Number(f64),
    Text(String),
}

impl SearchItem {
    fn into_quote(self) -> ListingQuote {
        let price = match self.price {
            RawPrice::Number(value) => value,
            RawPrice::Text(text) => parse_price(&text),
        };
        ListingQuote {
            title: self.title,
            price,
            url: self.url,
            trusted: self.trusted,
        }
    }
}
