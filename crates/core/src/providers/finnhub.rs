use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use super::traits::{PriceProvider, SymbolMatch, SymbolSearch};
use crate::errors::CoreError;
use crate::models::asset::AssetType;
use crate::models::price::{PriceData, PriceQuote};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_NAME: &str = "Finnhub";

/// Finnhub API provider for stock quotes, crypto pairs and symbol search.
///
/// - **Free tier**: 60 calls/minute, hence the default 1.1 s pacing.
/// - **Requires**: API key (set via settings as `FINNHUB_KEY`).
/// - **Crypto**: exchange-prefixed pairs such as `BINANCE:BTCUSDT` go through
///   the same `/quote` endpoint as equities.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
}

impl FinnhubProvider {
    pub fn new(api_key: String) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, CoreError> {
        debug!("Finnhub request: {endpoint} with {} params", params.len());

        let response = self
            .client
            .get(format!("{BASE_URL}{endpoint}"))
            .header("X-Finnhub-Token", &self.api_key)
            .query(params)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(CoreError::RateLimited {
                provider: PROVIDER_NAME.into(),
            }),
            StatusCode::UNAUTHORIZED => Err(CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: "Invalid or missing API key".into(),
            }),
            status if !status.is_success() => Err(CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("HTTP {status}"),
            }),
            _ => Ok(response.text().await?),
        }
    }
}

// ── Finnhub API response types ──────────────────────────────────────

/// Response from `/quote`
#[derive(Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Previous close
    pc: Option<f64>,
}

/// Response from `/search`
#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    symbol: String,
    #[serde(default)]
    description: String,
}

/// Parse a `/quote` body into a normalized quote.
///
/// The day change is derived from the previous close (`pc`); it is 0 when no
/// previous close is reported. Finnhub answers unknown symbols with `c: 0`,
/// which is treated as "no price".
pub fn parse_quote(body: &str, symbol: &str) -> Result<PriceQuote, CoreError> {
    let resp: QuoteResponse = serde_json::from_str(body).map_err(|e| CoreError::Api {
        provider: PROVIDER_NAME.into(),
        message: format!("Failed to parse quote for {symbol}: {e}"),
    })?;

    let price = resp
        .c
        .filter(|c| c.is_finite() && *c > 0.0)
        .ok_or_else(|| CoreError::Api {
            provider: PROVIDER_NAME.into(),
            message: format!("No quote data for symbol {symbol}"),
        })?;

    let previous = resp.pc.filter(|pc| pc.is_finite() && *pc > 0.0);
    let change_percent = previous.map_or(0.0, |pc| (price - pc) / pc * 100.0);

    Ok(PriceQuote {
        price,
        change_percent: Some(change_percent),
        previous_price: Some(previous.unwrap_or(price)),
    })
}

/// Parse a `/search` body into raw matches.
pub fn parse_search(body: &str) -> Result<Vec<SymbolMatch>, CoreError> {
    let resp: SearchResponse = serde_json::from_str(body).map_err(|e| CoreError::Api {
        provider: PROVIDER_NAME.into(),
        message: format!("Failed to parse search response: {e}"),
    })?;
    Ok(resp
        .result
        .into_iter()
        .map(|item| SymbolMatch {
            symbol: item.symbol,
            description: item.description,
        })
        .collect())
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceProvider for FinnhubProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock, AssetType::Crypto]
    }

    async fn fetch_quote(&self, symbol: &str, _currency: &str) -> Result<PriceData, CoreError> {
        let body = self.get("/quote", &[("symbol", symbol)]).await?;
        parse_quote(&body, symbol).map(PriceData::Quote)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl SymbolSearch for FinnhubProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, CoreError> {
        let body = self.get("/search", &[("q", query)]).await?;
        parse_search(&body)
    }
}
