//! The seam between the service and whatever answers weather queries.

use common::{Error, WeatherQuery, WeatherReading};
use owm_client::OwmClient;
use std::future::Future;

/// Something that can turn a query into a reading.
///
/// Readings come back unlabeled; the service assigns `source_label`.
pub trait WeatherProvider: Send + Sync {
    /// Whether a credential is configured. Requests are not attempted
    /// without one.
    fn has_credential(&self) -> bool {
        true
    }

    fn fetch(
        &self,
        query: &WeatherQuery,
    ) -> impl Future<Output = Result<WeatherReading, Error>> + Send;
}

impl WeatherProvider for OwmClient {
    fn has_credential(&self) -> bool {
        OwmClient::has_credential(self)
    }

    async fn fetch(&self, query: &WeatherQuery) -> Result<WeatherReading, Error> {
        self.fetch_current(query).await
    }
}
