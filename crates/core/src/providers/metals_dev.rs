use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use super::traits::PriceProvider;
use crate::errors::CoreError;
use crate::models::asset::AssetType;
use crate::models::price::{PriceData, PriceQuote};

const BASE_URL: &str = "https://api.metals.dev/v1";
const PROVIDER_NAME: &str = "metals.dev";

/// metals.dev API provider for precious metals spot prices.
///
/// - **Free tier**: 100 requests/month (no credit card required).
/// - **Requires**: API key (set via settings as `METALS_DEV_KEY`).
/// - **Symbols**: metal names as metals.dev spells them (gold, silver, platinum, palladium).
/// - **Currency**: quotes are requested directly in the portfolio's base currency.
pub struct MetalsDevProvider {
    client: Client,
    api_key: String,
}

impl MetalsDevProvider {
    pub fn new(api_key: String) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }
}

/// Extract a spot quote from a `/metal/spot` response.
///
/// The response shape has varied over time, so this accepts, in order:
/// - `rate: { price, change | change_pct | previous_close }`
/// - `rate: <number>` (no change data, reported as a 0 % change)
/// - top level `price` with optional `change | change_pct | previous_close`
// Note: parsed via serde_json::Value because the field set is not stable.
pub fn parse_spot(body: &str, metal: &str) -> Result<PriceQuote, CoreError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| CoreError::Api {
        provider: PROVIDER_NAME.into(),
        message: format!("Failed to parse spot response for {metal}: {e}"),
    })?;

    let quote = match parsed.get("rate") {
        Some(rate) if rate.is_object() => rate
            .get("price")
            .and_then(Value::as_f64)
            .map(|price| quote_with_change(price, rate)),
        Some(rate) => rate.as_f64().map(|price| quote_with_change(price, &Value::Null)),
        None => parsed
            .get("price")
            .and_then(Value::as_f64)
            .map(|price| quote_with_change(price, &parsed)),
    };

    quote
        .filter(PriceQuote::is_valid)
        .ok_or_else(|| CoreError::Api {
            provider: PROVIDER_NAME.into(),
            message: format!("Could not extract a valid price for {metal}"),
        })
}

fn quote_with_change(price: f64, fields: &Value) -> PriceQuote {
    let field = |name: &str| fields.get(name).and_then(Value::as_f64);

    if let Some(change) = field("change").or_else(|| field("change_pct")) {
        return PriceQuote {
            price,
            change_percent: Some(change),
            previous_price: Some(price),
        };
    }
    match field("previous_close").filter(|pc| *pc > 0.0) {
        Some(previous) => PriceQuote {
            price,
            change_percent: Some((price - previous) / previous * 100.0),
            previous_price: Some(previous),
        },
        None => PriceQuote {
            price,
            change_percent: Some(0.0),
            previous_price: Some(price),
        },
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceProvider for MetalsDevProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Metal]
    }

    async fn fetch_quote(&self, symbol: &str, currency: &str) -> Result<PriceData, CoreError> {
        debug!("metals.dev spot request for {symbol} in {currency}");

        let response = self
            .client
            .get(format!("{BASE_URL}/metal/spot"))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("metal", symbol),
                ("currency", currency),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(CoreError::RateLimited {
                provider: PROVIDER_NAME.into(),
            }),
            status if !status.is_success() => Err(CoreError::Api {
                provider: PROVIDER_NAME.into(),
                message: format!("HTTP {status} for {symbol}"),
            }),
            _ => {
                let body = response.text().await?;
                parse_spot(&body, symbol).map(PriceData::Quote)
            }
        }
    }
}
