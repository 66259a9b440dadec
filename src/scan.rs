use crate::approve::{self, Decision};
use crate::clair::{ClairClient, LayerAnalyzer, LayerReport};
use crate::docker::{ImageSource, LayerRef};
use crate::errors::*;
use crate::server::LayerServer;
use crate::whitelist::Whitelist;
use crate::workspace::Workspace;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 9279;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub image: String,
    pub clair_url: String,
    /// Address Clair can reach this host on to pull layer bytes.
    pub ip: String,
    pub port: u16,
    pub timeout: Option<Duration>,
}

/// Runs one full scan: export the image into a workspace, serve its
/// layers, register them with Clair in dependency order, fetch the
/// aggregated report and apply the whitelist.
///
/// The workspace is destroyed and the layer server stopped on every exit
/// path, including ctrl-c, which cancels the scan instead of killing the
/// process mid-flight.
pub async fn run<S: ImageSource>(
    opts: &ScanOptions,
    source: &S,
    whitelist: &Whitelist,
) -> Result<Decision> {
    let workspace = Workspace::create()?;

    let mut server = None;
    let result = tokio::select! {
        result = scan_image(opts, source, &workspace, &mut server) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, aborting scan");
            Err(anyhow!("Scan interrupted"))
        }
    };

    let decision = result.map(|report| {
        if report.unsupported {
            warn!("No features have been detected in the image. This usually means that the image isn't supported by Clair");
        }
        approve::decide(&opts.image, &report.findings, whitelist)
    });

    if let Some(server) = server {
        server.stop().await;
    }
    workspace.destroy();

    decision
}

async fn scan_image<S: ImageSource>(
    opts: &ScanOptions,
    source: &S,
    workspace: &Workspace,
    server: &mut Option<LayerServer>,
) -> Result<LayerReport> {
    info!("Saving {:?}", opts.image);
    let layers = source
        .export(&opts.image, workspace.path())
        .await
        .with_context(|| anyhow!("Failed to export image {:?}", opts.image))?;

    let top = layers
        .last()
        .ok_or_else(|| anyhow!("Image {:?} has no layers", opts.image))?
        .clone();
    debug!("Resolved {} layers, top layer {:?}", layers.len(), top.id);

    // Clair pulls layer bytes while submissions are still in flight, the
    // server has to accept connections before the first submission.
    let handle = LayerServer::start(workspace.path(), opts.port).await?;
    let port = handle.port();
    *server = Some(handle);

    let clair = ClairClient::new(&opts.clair_url, opts.timeout)?;
    submit_layers(&clair, &layers, &opts.ip, port).await?;

    clair
        .fetch_vulnerabilities(&top.id)
        .await
        .context("Analyzing failed")
}

/// Registers every layer with the analyzer, parents first. Clair only
/// aggregates a child's report correctly once its parent is known, so
/// layers are submitted one at a time in image order.
pub async fn submit_layers<A: LayerAnalyzer>(
    analyzer: &A,
    layers: &[LayerRef],
    ip: &str,
    port: u16,
) -> Result<()> {
    let mut parent: Option<&str> = None;
    for layer in layers {
        let url = format!("http://{}:{}/{}", ip, port, layer.path);
        analyzer
            .submit_layer(&layer.id, parent, &url)
            .await
            .with_context(|| anyhow!("Failed to submit layer {:?}", layer.id))?;
        parent = Some(&layer.id);
    }
    Ok(())
}
