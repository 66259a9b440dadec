use crate::errors::*;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const LAYER_FORMAT: &str = "Docker";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LayerEnvelope {
    #[serde(rename = "Layer", skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl LayerEnvelope {
    /// The api signals errors in-band, convert to a real result here so
    /// nothing downstream has to poke at optional fields.
    pub fn into_result(self) -> Result<Layer> {
        if let Some(error) = self.error {
            bail!("Clair returned an error: {}", error.message);
        }
        self.layer
            .ok_or_else(|| anyhow!("Clair response contains neither layer nor error"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Layer {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "ParentName", default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(rename = "Format", default)]
    pub format: String,
    #[serde(rename = "Features", default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<Feature>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "NamespaceName", default)]
    pub namespace_name: String,
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "Vulnerabilities", default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "NamespaceName", default)]
    pub namespace_name: String,
    #[serde(rename = "Severity", default)]
    pub severity: String,
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "Link", default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(rename = "FixedBy", default, skip_serializing_if = "String::is_empty")]
    pub fixed_by: String,
}

/// One detected vulnerability occurrence. The same identifier may show up
/// in multiple namespaces, those count as distinct findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulnerabilityFinding {
    pub name: String,
    pub namespace: String,
    pub severity: String,
}

#[derive(Debug, Default)]
pub struct LayerReport {
    pub findings: Vec<VulnerabilityFinding>,
    /// No features were detected, the image is likely not supported by
    /// Clair. Not an error, the scan proceeds with zero findings.
    pub unsupported: bool,
}

impl LayerReport {
    fn from_layer(layer: Layer) -> LayerReport {
        if layer.features.is_empty() {
            return LayerReport {
                findings: Vec::new(),
                unsupported: true,
            };
        }

        let findings = layer
            .features
            .into_iter()
            .flat_map(|feature| feature.vulnerabilities)
            .map(|vuln| VulnerabilityFinding {
                name: vuln.name,
                namespace: vuln.namespace_name,
                severity: vuln.severity,
            })
            .collect();

        LayerReport {
            findings,
            unsupported: false,
        }
    }
}

#[async_trait]
pub trait LayerAnalyzer {
    async fn submit_layer(&self, layer_id: &str, parent_id: Option<&str>, path: &str)
        -> Result<()>;
    async fn fetch_vulnerabilities(&self, layer_id: &str) -> Result<LayerReport>;
}

pub struct ClairClient {
    client: Client,
    url: String,
}

impl ClairClient {
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<ClairClient> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to setup http client")?;

        Ok(ClairClient {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LayerAnalyzer for ClairClient {
    async fn submit_layer(
        &self,
        layer_id: &str,
        parent_id: Option<&str>,
        path: &str,
    ) -> Result<()> {
        let url = format!("{}/v1/layers", self.url);
        let payload = LayerEnvelope {
            layer: Some(Layer {
                name: layer_id.to_string(),
                path: Some(path.to_string()),
                parent_name: parent_id.map(String::from),
                format: LAYER_FORMAT.to_string(),
                features: Vec::new(),
            }),
            error: None,
        };

        debug!("Submitting layer {:?} (parent={:?})", layer_id, parent_id);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to connect to Clair")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Got response {} with message {}", status.as_u16(), body);
        }

        Ok(())
    }

    async fn fetch_vulnerabilities(&self, layer_id: &str) -> Result<LayerReport> {
        let url = format!("{}/v1/layers/{}?vulnerabilities", self.url, layer_id);

        debug!("Fetching vulnerability report for layer {:?}", layer_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to Clair")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Got response {} with message {}", status.as_u16(), body);
        }

        let envelope = response
            .json::<LayerEnvelope>()
            .await
            .context("Failed to decode Clair response")?;
        let layer = envelope.into_result()?;

        Ok(LayerReport::from_layer(layer))
    }
}
