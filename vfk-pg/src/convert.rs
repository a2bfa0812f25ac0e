//! Conversion Service client
//!
//! The external service performs the bulk row population of a staging
//! schema from a raw extract. It is treated as opaque: one POST, success or
//! failure. This is the only step of an import with variable, possibly
//! long, latency, so the request carries a timeout; a timeout counts as a
//! conversion failure like any other.

use std::future::Future;

use serde::Serialize;
use tracing::info;

use crate::config::ConversionConfig;
use crate::error::{Error, Result};

const CONVERT_PATH: &str = "/api/ogr2ogr/v1/vfk-to-postgis";

/// Bulk population of a staging schema from an extract file.
///
/// The import orchestrator only depends on this seam, so tests can drive a
/// whole import with a converter that fails, or one that writes fixture
/// rows, without a live service.
pub trait Converter {
    /// Populates `db_schema` from the extract at `file_path`. Any failure
    /// is a [`Error::ConversionFailure`]; the caller must not promote
    /// after one.
    fn convert(
        &self,
        file_path: &str,
        db_schema: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    file_path: &'a str,
    db_schema: &'a str,
}

/// Thin client over the Conversion Service endpoint.
pub struct ConversionClient {
    http: reqwest::Client,
    base_url: String,
}

impl ConversionClient {
    pub fn new(config: &ConversionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ConversionFailure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Converter for ConversionClient {
    /// One POST to the service. Non-success status, transport error and
    /// timeout all count as conversion failures.
    async fn convert(&self, file_path: &str, db_schema: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, CONVERT_PATH);
        info!(url = %url, db_schema = db_schema, "Requesting conversion");

        let response = self
            .http
            .post(&url)
            .json(&ConvertRequest {
                file_path,
                db_schema,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::ConversionFailure(format!("conversion timed out: {e}"))
                } else {
                    Error::ConversionFailure(format!("conversion request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ConversionFailure(format!(
                "conversion service returned {status}: {body}"
            )));
        }

        info!(db_schema = db_schema, "Conversion finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_base_url_trailing_slash_is_normalised() {
        let client = ConversionClient::new(&ConversionConfig {
            base_url: "http://converter:8200/".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(client.base_url, "http://converter:8200");
    }
}
