//! HTTP client for the Docker Engine API.
//!
//! Implements all three discovery seams against a single daemon endpoint:
//! container listing for [`TargetSource`], the `/events` stream for
//! [`LifecycleEventSource`] and a label reset for [`TriggerControl`].

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::{stream, TryStreamExt};
use serde::Deserialize;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::labels::target_from_labels;
use super::models::{BackupTarget, LifecycleAction, LifecycleEvent};
use super::trait_def::{
    DiscoveryError, LifecycleEventSource, LifecycleEventStream, TargetSource, TriggerControl,
};

/// Client for a Docker Engine reachable over TCP.
pub struct DockerClient {
    client: reqwest::Client,
    /// Separate client for `/events`: that request never completes, so the
    /// regular request timeout must not apply to it.
    events_client: reqwest::Client,
    base_url: String,
    label_prefix: String,
}

impl DockerClient {
    /// Create a new Docker Engine client.
    ///
    /// # Arguments
    /// * `base_url` - Engine API endpoint (e.g., "http://127.0.0.1:2375")
    /// * `timeout_sec` - Request timeout in seconds for non-streaming calls
    /// * `label_prefix` - Prefix the backup labels live under
    pub fn new(base_url: String, timeout_sec: u64, label_prefix: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        let events_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            client,
            events_client,
            base_url,
            label_prefix,
        }
    }

    /// Get the engine API endpoint this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TargetSource for DockerClient {
    async fn list_targets(&self) -> Result<Vec<BackupTarget>, DiscoveryError> {
        let url = format!("{}/containers/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("all", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Unavailable(format!(
                "container list returned status {}",
                response.status()
            )));
        }

        let summaries: Vec<ContainerSummary> = response.json().await?;
        Ok(summaries
            .into_iter()
            .map(|summary| summary.into_target(&self.label_prefix))
            .collect())
    }
}

#[async_trait]
impl TriggerControl for DockerClient {
    async fn clear_trigger(&self, name: &str) -> Result<()> {
        let url = format!("{}/containers/{}/update", self.base_url, name);
        let mut labels = HashMap::new();
        labels.insert(
            format!("{}.trigger_backup", self.label_prefix),
            "false".to_string(),
        );

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "Labels": labels }))
            .send()
            .await
            .with_context(|| format!("Failed to reach engine to clear trigger on {}", name))?;

        if !response.status().is_success() {
            bail!(
                "Failed to clear trigger on {}: status {}",
                name,
                response.status()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleEventSource for DockerClient {
    async fn subscribe(&self) -> Result<LifecycleEventStream> {
        let url = format!("{}/events", self.base_url);
        let response = self
            .events_client
            .get(&url)
            .query(&[("filters", r#"{"type":["container"]}"#)])
            .send()
            .await
            .context("Failed to open container event stream")?;

        if !response.status().is_success() {
            bail!("Event stream request returned status {}", response.status());
        }

        // The engine writes one JSON document per line.
        let lines =
            StreamReader::new(response.bytes_stream().map_err(std::io::Error::other)).lines();

        Ok(Box::pin(stream::unfold(lines, |mut lines| async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_event_line(&line) {
                            return Some((Ok(event), lines));
                        }
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        let err =
                            anyhow::Error::from(e).context("Container event stream failed");
                        return Some((Err(err), lines));
                    }
                }
            }
        })))
    }
}

/// One entry of `GET /containers/json`.
#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    /// The engine reports `null` rather than `{}` for unlabelled containers.
    #[serde(rename = "Labels")]
    labels: Option<HashMap<String, String>>,
}

impl ContainerSummary {
    fn into_target(self, label_prefix: &str) -> BackupTarget {
        let name = self
            .names
            .first()
            .map(|name| name.trim_start_matches('/').to_string())
            .unwrap_or(self.id);
        target_from_labels(&name, label_prefix, &self.labels.unwrap_or_default())
    }
}

/// One line of the `GET /events` stream.
#[derive(Debug, Deserialize)]
struct EventMessage {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Actor")]
    actor: EventActor,
}

#[derive(Debug, Deserialize)]
struct EventActor {
    #[serde(rename = "Attributes", default)]
    attributes: HashMap<String, String>,
}

/// Decode one event line, returning None for anything that is not a
/// container lifecycle change we act on.
fn parse_event_line(line: &str) -> Option<LifecycleEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let message: EventMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            debug!("Skipping undecodable event line: {}", e);
            return None;
        }
    };
    if message.kind != "container" {
        return None;
    }

    let action = LifecycleAction::from_str(&message.action)?;
    let name = message.actor.attributes.get("name")?.clone();
    Some(LifecycleEvent { name, action })
}
