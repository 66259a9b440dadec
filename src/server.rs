use crate::errors::*;
use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

/// Serves the exported layer archives from the workspace so Clair can
/// pull their bytes while layers are being submitted.
pub struct LayerServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LayerServer {
    /// Binds the listener before returning, callers may advertise layer
    /// urls as soon as this resolves.
    pub async fn start(dir: &Path, port: u16) -> Result<LayerServer> {
        let app = Router::new().fallback_service(ServeDir::new(dir));

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| anyhow!("Failed to bind layer server to {}", addr))?;
        let addr = listener.local_addr()?;

        let (shutdown, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                rx.await.ok();
            });
            if let Err(err) = serve.await {
                error!("Layer server failed: {:#}", err);
            }
        });

        debug!("Layer server listening on {}", addr);
        Ok(LayerServer {
            addr,
            shutdown,
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn stop(self) {
        self.shutdown.send(()).ok();
        if let Err(err) = self.task.await {
            warn!("Layer server task failed to shut down: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_serve_workspace_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("aaa"))?;
        fs::write(dir.path().join("aaa/layer.tar"), b"layer bytes")?;

        let server = LayerServer::start(dir.path(), 0).await?;
        let url = format!("http://127.0.0.1:{}/aaa/layer.tar", server.port());

        let body = reqwest::get(&url).await?.error_for_status()?.bytes().await?;
        assert_eq!(&body[..], b"layer bytes");

        server.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_404() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let server = LayerServer::start(dir.path(), 0).await?;
        let url = format!("http://127.0.0.1:{}/nope", server.port());

        let status = reqwest::get(&url).await?.status();
        assert_eq!(status.as_u16(), 404);

        server.stop().await;
        Ok(())
    }
}
