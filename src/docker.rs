use crate::errors::*;
use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tokio::process::Command;

/// One layer of an exported image. The path is relative to the workspace
/// root and doubles as the url path the layer server exposes it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRef {
    pub id: String,
    pub path: String,
}

/// Exports a container image into a directory and reports its layers,
/// base layer first, top layer last.
#[async_trait]
pub trait ImageSource {
    async fn export(&self, image: &str, dest: &Path) -> Result<Vec<LayerRef>>;
}

pub struct DockerSource;

#[async_trait]
impl ImageSource for DockerSource {
    async fn export(&self, image: &str, dest: &Path) -> Result<Vec<LayerRef>> {
        save_image(image, dest).await?;

        let manifest = fs::read(dest.join("manifest.json"))
            .context("Failed to read image manifest")?;
        layers_from_manifest(&manifest)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

async fn save_image(image: &str, dest: &Path) -> Result<()> {
    let archive = dest.join("image.tar");

    let cmd = Command::new("docker")
        .args(["save", image, "-o"])
        .arg(&archive)
        .spawn()
        .context("Failed to run docker save")?;

    let out = cmd.wait_with_output().await?;
    if !out.status.success() {
        bail!(
            "Process (docker save {:?}) exited with error: {:?}",
            image,
            out.status
        );
    }

    let file = fs::File::open(&archive).context("Failed to open image archive")?;
    tar::Archive::new(file)
        .unpack(dest)
        .context("Failed to unpack image archive")?;
    fs::remove_file(&archive).ok();

    Ok(())
}

fn layers_from_manifest(buf: &[u8]) -> Result<Vec<LayerRef>> {
    let manifest = serde_json::from_slice::<Vec<ManifestEntry>>(buf)
        .context("Failed to parse image manifest")?;
    let entry = manifest
        .first()
        .ok_or_else(|| anyhow!("Image manifest contains no images"))?;

    entry.layers.iter().map(|path| layer_ref(path)).collect()
}

// Legacy manifests list layers as `<id>/layer.tar`, oci layouts as
// `blobs/sha256/<digest>`. Either way the last directory component is
// unique within the image and safe to use as a url path segment.
fn layer_ref(path: &str) -> Result<LayerRef> {
    let id = path.strip_suffix("/layer.tar").unwrap_or(path);
    let id = id
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("Invalid layer path in image manifest: {:?}", path))?;

    Ok(LayerRef {
        id: id.to_string(),
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_from_legacy_manifest() -> Result<()> {
        let manifest = br#"[{
            "Config": "cfg.json",
            "RepoTags": ["myapp:1.0"],
            "Layers": ["aaa/layer.tar", "bbb/layer.tar", "ccc/layer.tar"]
        }]"#;
        let layers = layers_from_manifest(manifest)?;
        assert_eq!(
            layers,
            vec![
                LayerRef {
                    id: "aaa".to_string(),
                    path: "aaa/layer.tar".to_string(),
                },
                LayerRef {
                    id: "bbb".to_string(),
                    path: "bbb/layer.tar".to_string(),
                },
                LayerRef {
                    id: "ccc".to_string(),
                    path: "ccc/layer.tar".to_string(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_layers_from_oci_manifest() -> Result<()> {
        let manifest = br#"[{
            "Layers": ["blobs/sha256/1111", "blobs/sha256/2222"]
        }]"#;
        let layers = layers_from_manifest(manifest)?;
        assert_eq!(
            layers,
            vec![
                LayerRef {
                    id: "1111".to_string(),
                    path: "blobs/sha256/1111".to_string(),
                },
                LayerRef {
                    id: "2222".to_string(),
                    path: "blobs/sha256/2222".to_string(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_empty_manifest() {
        let result = layers_from_manifest(b"[]");
        assert!(result.is_err());
    }
}
