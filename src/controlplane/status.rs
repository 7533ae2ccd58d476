//! Config Agent Status Client
//!
//! Asks an instance's config agent for the database status. One request
//! per call under a fixed timeout; failures are returned to the caller,
//! which owns the retry policy.

use crate::domain::ports::StatusChecker;
use crate::error::{Error, Result};
use crate::resources::consts::CONFIG_AGENT_PORT;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Bound on connecting to and hearing back from the config agent
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(3 * 60);

const CHECK_STATUS_PATH: &str = "/v1/checkStatus";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckStatusRequest<'a> {
    name: &'a str,
    cdb_name: &'a str,
    check_status_type: &'static str,
    db_domain: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckStatusResponse {
    #[serde(default)]
    status: String,
}

/// HTTP client of the config agent status endpoint
#[derive(Debug, Clone)]
pub struct ConfigAgentClient {
    port: u16,
    timeout: Duration,
}

impl Default for ConfigAgentClient {
    fn default() -> Self {
        Self {
            port: CONFIG_AGENT_PORT as u16,
            timeout: DIAL_TIMEOUT,
        }
    }
}

impl ConfigAgentClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, address: &str) -> String {
        format!("http://{}:{}{}", address, self.port, CHECK_STATUS_PATH)
    }

    fn classify(&self, address: &str, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::StatusCheckTimeout {
                address: address.to_string(),
                timeout: self.timeout,
            }
        } else {
            Error::StatusCheck {
                address: address.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl StatusChecker for ConfigAgentClient {
    async fn check_instance_status(
        &self,
        instance_name: &str,
        cdb_name: &str,
        address: &str,
        db_domain: &str,
    ) -> Result<String> {
        // Built per call so no connection outlives the request
        let http = HttpClient::builder()
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .build()?;

        let body = CheckStatusRequest {
            name: instance_name,
            cdb_name,
            check_status_type: "INSTANCE",
            db_domain,
        };
        debug!("checking status of instance {} at {}", instance_name, address);

        let resp = http
            .post(self.url(address))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(address, e))?;

        if !resp.status().is_success() {
            return Err(Error::StatusCheck {
                address: address.to_string(),
                reason: format!("config agent answered {}", resp.status()),
            });
        }

        let parsed: CheckStatusResponse =
            resp.json().await.map_err(|e| self.classify(address, e))?;
        info!("instance {} reports status {:?}", instance_name, parsed.status);
        Ok(parsed.status)
    }
}
