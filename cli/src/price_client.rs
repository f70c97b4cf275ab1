use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;

use bakecost_core::error::FetchError;
use bakecost_core::models::{ExternalId, PriceMap};
use bakecost_core::remote::{PRODUCTS_PARAM, batch_query, decode_prices};
use bakecost_core::service::PriceSource;

pub struct RemotePriceClient {
    client: reqwest::Client,
    endpoint: String,
    rt: tokio::runtime::Handle,
}

impl RemotePriceClient {
    /// Must be called from inside the tokio runtime.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("bakecost/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            rt: tokio::runtime::Handle::current(),
        })
    }

    /// One batched request for every id. Unknown ids are simply absent from the map.
    pub async fn fetch_prices_async(
        &self,
        ids: &BTreeSet<ExternalId>,
    ) -> Result<PriceMap, FetchError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[(PRODUCTS_PARAM, batch_query(ids))])
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        let prices = decode_prices(&body)?;
        tracing::debug!(requested = ids.len(), received = prices.len(), "price response decoded");
        Ok(prices)
    }
}

impl PriceSource for RemotePriceClient {
    fn fetch_prices(&self, ids: &BTreeSet<ExternalId>) -> Result<PriceMap, FetchError> {
        self.rt.block_on(self.fetch_prices_async(ids))
    }
}
