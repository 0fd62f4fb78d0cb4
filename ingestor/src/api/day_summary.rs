use super::{MarketDataApi, MercadoBitcoinClient, Query};
use crate::model::{Batch, Record};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use ingest_core::{Error, Result};
use tracing::instrument;

/// Daily open/close/high/low summary for one coin.
pub struct DaySummaryApi {
    coin: String,
    client: MercadoBitcoinClient,
}

impl DaySummaryApi {
    pub const NAME: &'static str = "DaySummary";

    pub fn new(coin: &str, client: MercadoBitcoinClient) -> Self {
        Self {
            coin: coin.to_string(),
            client,
        }
    }

    /// The summary record for `date`.
    #[instrument(skip(self), fields(coin = %self.coin))]
    pub async fn get_data(&self, date: NaiveDate) -> Result<Record> {
        self.fetch_record(&Query::Day(date)).await
    }

    async fn fetch_record(&self, query: &Query) -> Result<Record> {
        let url = self.endpoint(query)?;
        let value = self.client.get_json(Self::NAME, &url).await?;
        match Batch::try_from(value)? {
            Batch::Single(record) => Ok(record),
            Batch::Many(records) => Err(Error::Api {
                api: Self::NAME.to_string(),
                status: None,
                details: format!("expected one summary from {}, got {}", url, records.len()),
            }),
        }
    }
}

#[async_trait]
impl MarketDataApi for DaySummaryApi {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn endpoint(&self, query: &Query) -> Result<String> {
        match query {
            Query::Day(date) => Ok(format!(
                "{}/{}/day-summary/{}/{}/{}",
                self.client.base_url(),
                self.coin,
                date.year(),
                date.month(),
                date.day()
            )),
            Query::Range { .. } => Err(Error::Config(
                "DaySummary is queried one day at a time".to_string(),
            )),
        }
    }

    async fn fetch(&self, query: &Query) -> Result<Batch> {
        Ok(Batch::Single(self.fetch_record(query).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::config::ApiConfig;
    use pretty_assertions::assert_eq;

    fn api() -> DaySummaryApi {
        let config = ApiConfig {
            base_url: "https://www.mercadobitcoin.net/api/".to_string(),
            ..ingest_core::Config::default().api
        };
        DaySummaryApi::new("BTC", MercadoBitcoinClient::new(&config).unwrap())
    }

    #[test]
    fn day_endpoint_uses_unpadded_date_parts() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(
            api().endpoint(&Query::Day(date)).unwrap(),
            "https://www.mercadobitcoin.net/api/BTC/day-summary/2021/1/1"
        );
    }

    #[tokio::test]
    async fn range_queries_are_rejected_before_any_request() {
        let query = Query::Range { from: None, to: None };
        assert!(matches!(api().endpoint(&query), Err(Error::Config(_))));
        assert!(matches!(api().fetch(&query).await, Err(Error::Config(_))));
    }
}
