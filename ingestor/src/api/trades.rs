use super::{MarketDataApi, MercadoBitcoinClient, Query};
use crate::model::{Batch, Record};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{Error, Result};
use tracing::instrument;

/// Executed trades for one coin, optionally bounded by unix timestamps.
pub struct TradesApi {
    coin: String,
    client: MercadoBitcoinClient,
}

impl TradesApi {
    pub const NAME: &'static str = "Trades";

    pub fn new(coin: &str, client: MercadoBitcoinClient) -> Self {
        Self {
            coin: coin.to_string(),
            client,
        }
    }

    fn range_url(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<String> {
        let base = format!("{}/{}/trades", self.client.base_url(), self.coin);
        match (from, to) {
            (None, None) => Ok(base),
            (Some(from), None) => Ok(format!("{}/{}", base, from.timestamp())),
            (Some(from), Some(to)) if from <= to => {
                Ok(format!("{}/{}/{}", base, from.timestamp(), to.timestamp()))
            }
            (Some(from), Some(to)) => Err(Error::Config(format!(
                "trades range is inverted: {} > {}",
                from, to
            ))),
            (None, Some(_)) => Err(Error::Config(
                "trades range needs a start when an end is given".to_string(),
            )),
        }
    }

    #[instrument(skip(self), fields(coin = %self.coin))]
    pub async fn get_data(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>> {
        self.fetch_records(&Query::Range { from, to }).await
    }

    async fn fetch_records(&self, query: &Query) -> Result<Vec<Record>> {
        let url = self.endpoint(query)?;
        let value = self.client.get_json(Self::NAME, &url).await?;
        Ok(match Batch::try_from(value)? {
            Batch::Single(record) => vec![record],
            Batch::Many(records) => records,
        })
    }
}

/// A day query covers 00:00:00 through 23:59:59 UTC.
fn bounds(query: &Query) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match *query {
        Query::Range { from, to } => (from, to),
        Query::Day(date) => (
            date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            date.and_hms_opt(23, 59, 59).map(|dt| dt.and_utc()),
        ),
    }
}

#[async_trait]
impl MarketDataApi for TradesApi {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn endpoint(&self, query: &Query) -> Result<String> {
        let (from, to) = bounds(query);
        self.range_url(from, to)
    }

    async fn fetch(&self, query: &Query) -> Result<Batch> {
        Ok(Batch::Many(self.fetch_records(query).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn api() -> TradesApi {
        let client = MercadoBitcoinClient::new(&ingest_core::Config::default().api).unwrap();
        TradesApi::new("ETH", client)
    }

    #[test]
    fn unbounded_query_hits_the_latest_trades() {
        let query = Query::Range { from: None, to: None };
        assert_eq!(
            api().endpoint(&query).unwrap(),
            "https://www.mercadobitcoin.net/api/ETH/trades"
        );
    }

    #[test]
    fn bounded_query_uses_unix_seconds() {
        let from = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2021, 1, 1, 1, 0, 0).unwrap();

        assert_eq!(
            api().endpoint(&Query::Range { from: Some(from), to: None }).unwrap(),
            "https://www.mercadobitcoin.net/api/ETH/trades/1609459200"
        );
        assert_eq!(
            api().endpoint(&Query::Range { from: Some(from), to: Some(to) }).unwrap(),
            "https://www.mercadobitcoin.net/api/ETH/trades/1609459200/1609462800"
        );
    }

    #[test]
    fn day_query_covers_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(
            api().endpoint(&Query::Day(date)).unwrap(),
            "https://www.mercadobitcoin.net/api/ETH/trades/1609459200/1609545599"
        );
    }

    #[tokio::test]
    async fn malformed_ranges_are_rejected() {
        let from = Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();

        let inverted = Query::Range { from: Some(from), to: Some(to) };
        let open_start = Query::Range { from: None, to: Some(to) };
        assert!(matches!(api().endpoint(&inverted), Err(Error::Config(_))));
        assert!(matches!(api().endpoint(&open_start), Err(Error::Config(_))));
        assert!(matches!(api().fetch(&inverted).await, Err(Error::Config(_))));
    }
}
