//! REST status source
//!
//! Reads the cluster resource of the install service,
//! `GET <api_url>/api/assisted-install/v2/clusters/<cluster_id>`, and maps
//! its `status` field onto milestone progress.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Milestone, MilestoneStatus, StatusError, StatusSource};

const CLUSTERS_PATH: &str = "/api/assisted-install/v2/clusters";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FAILED_STATUSES: [&str; 2] = ["error", "cancelled"];

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterStatus {
    pub status: String,

    #[serde(default)]
    pub status_info: String,
}

#[derive(Debug)]
pub struct RestStatusSource {
    client: reqwest::Client,
    url: String,
}

impl RestStatusSource {
    pub fn new(api_url: &str, cluster_id: &str) -> Result<Self, StatusError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StatusError::Fatal(e.to_string()))?;

        Ok(Self {
            client,
            url: format!(
                "{}{}/{}",
                api_url.trim_end_matches('/'),
                CLUSTERS_PATH,
                cluster_id
            ),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<ClusterStatus, StatusError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| StatusError::Transient(format!("GET {}: {}", self.url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StatusError::Fatal(format!("cluster not found at {}", self.url)));
        }
        if status.is_server_error() {
            return Err(StatusError::Transient(format!(
                "GET {} returned {}",
                self.url, status
            )));
        }
        if !status.is_success() {
            return Err(StatusError::Fatal(format!(
                "GET {} returned {}",
                self.url, status
            )));
        }

        response
            .json::<ClusterStatus>()
            .await
            .map_err(|e| StatusError::Transient(format!("invalid cluster status: {}", e)))
    }
}

/// Map a cluster status onto the progress of `milestone`
pub fn classify(milestone: Milestone, cluster: &ClusterStatus) -> MilestoneStatus {
    let status = cluster.status.as_str();

    if FAILED_STATUSES.contains(&status) {
        let reason = if cluster.status_info.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, cluster.status_info)
        };
        return MilestoneStatus::Failed(reason);
    }

    let reached: &[&str] = match milestone {
        Milestone::ClusterValidated => &[
            "ready",
            "preparing-for-installation",
            "installing",
            "installing-pending-user-action",
            "finalizing",
            "installed",
        ],
        Milestone::BootstrapComplete => &["finalizing", "installed"],
        Milestone::InstallComplete => &["installed"],
    };

    if reached.contains(&status) {
        MilestoneStatus::Reached
    } else {
        MilestoneStatus::Pending(status.to_string())
    }
}

#[async_trait]
impl StatusSource for RestStatusSource {
    async fn status(&self, milestone: Milestone) -> Result<MilestoneStatus, StatusError> {
        let cluster = self.fetch().await?;
        debug!(status = %cluster.status, info = %cluster.status_info, "Cluster status");
        Ok(classify(milestone, &cluster))
    }
}
