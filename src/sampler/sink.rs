use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::db::{Database, NewVolumeReading};

/// Destination for readings produced by the sampler.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    /// Persists one reading and returns its id.
    async fn submit(&self, reading: NewVolumeReading) -> Result<String>;
}

#[async_trait]
impl ReadingSink for Database {
    async fn submit(&self, reading: NewVolumeReading) -> Result<String> {
        self.insert_volume_reading(reading).await
    }
}

#[derive(Deserialize)]
struct CreatedReading {
    id: String,
}

/// Posts readings to the `/readings` endpoint of a running instance.
pub struct HttpReadingSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReadingSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ReadingSink for HttpReadingSink {
    async fn submit(&self, reading: NewVolumeReading) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&reading)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "reading rejected by {}: {}",
                self.endpoint,
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        let created: CreatedReading = response
            .json()
            .await
            .context("failed to decode reading response")?;
        Ok(created.id)
    }
}
