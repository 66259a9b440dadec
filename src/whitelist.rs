use crate::errors::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Vulnerabilities the user has pre-approved, globally or per image name.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Whitelist {
    #[serde(default, rename = "generalwhitelist")]
    pub general: HashMap<String, String>,
    #[serde(default, rename = "images")]
    pub images: HashMap<String, HashMap<String, String>>,
}

impl Whitelist {
    pub fn load(path: &Path) -> Result<Whitelist> {
        let buf = fs::read_to_string(path)
            .with_context(|| anyhow!("Failed to read whitelist file: {:?}", path))?;
        let whitelist = serde_yaml::from_str(&buf)
            .with_context(|| anyhow!("Failed to parse whitelist file: {:?}", path))?;
        Ok(whitelist)
    }

    /// Entries for one image. Keys in the `images` section never carry a
    /// tag, so the lookup name is truncated at the first `:`.
    pub fn for_image(&self, image: &str) -> Option<&HashMap<String, String>> {
        let name = image.split_once(':').map(|x| x.0).unwrap_or(image);
        self.images.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITELIST: &str = "generalwhitelist:
  CVE-2017-6055: XML
  CVE-2017-5586: OpenText
images:
  ubuntu:
    CVE-2017-5230: Java
  alpine:
    CVE-2017-3261: SecurityLibrary
";

    #[test]
    fn test_parse_whitelist() -> Result<()> {
        let whitelist = serde_yaml::from_str::<Whitelist>(WHITELIST)?;
        assert_eq!(whitelist.general.len(), 2);
        assert_eq!(
            whitelist.general.get("CVE-2017-6055").map(String::as_str),
            Some("XML")
        );
        assert_eq!(whitelist.images.len(), 2);
        assert!(whitelist.images["ubuntu"].contains_key("CVE-2017-5230"));
        Ok(())
    }

    #[test]
    fn test_parse_empty_sections() -> Result<()> {
        let whitelist = serde_yaml::from_str::<Whitelist>("generalwhitelist:\n  CVE-1: x\n")?;
        assert_eq!(whitelist.general.len(), 1);
        assert!(whitelist.images.is_empty());
        Ok(())
    }

    #[test]
    fn test_for_image_strips_tag() -> Result<()> {
        let whitelist = serde_yaml::from_str::<Whitelist>(WHITELIST)?;
        let entries = whitelist.for_image("ubuntu:16.04").unwrap();
        assert!(entries.contains_key("CVE-2017-5230"));
        Ok(())
    }

    #[test]
    fn test_for_image_unknown() -> Result<()> {
        let whitelist = serde_yaml::from_str::<Whitelist>(WHITELIST)?;
        assert!(whitelist.for_image("debian:11").is_none());
        Ok(())
    }
}
