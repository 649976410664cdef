//! Typed views of the two spec documents a version carries, and the loader
//! that pulls them out of a directory of manifests.
//!
//! Only the fields the version engine reads are modelled; everything else in
//! the manifests is ignored and the raw document text is kept verbatim so the
//! stored copy matches what was uploaded.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use tracing::debug;
use walkdir::WalkDir;

/// `app.k8s.io` Application: carries the descriptor links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    #[serde(default)]
    pub spec: DescriptorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    #[serde(default)]
    pub descriptor: Descriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(default)]
    pub links: Vec<DescriptorLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorLink {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

/// `kots.io` Application: display metadata and the declared application ports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KotsApplication {
    #[serde(default)]
    pub spec: KotsApplicationSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KotsApplicationSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, rename = "ports")]
    pub application_ports: Vec<ApplicationPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPort {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub service_port: i32,
    #[serde(default)]
    pub local_port: i32,
    #[serde(default, rename = "applicationUrl")]
    pub application_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocument<T> { pub parsed: T, pub raw: String }

/// The spec documents found in one version's manifests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KotsKinds {
    pub application: Option<SpecDocument<ApplicationDescriptor>>,
    pub kots_application: Option<SpecDocument<KotsApplication>>,
}

impl KotsKinds {
    pub fn title(&self) -> Option<&str> {
        self.kots_application.as_ref().map(|d| d.parsed.spec.title.as_str()).filter(|t| !t.is_empty())
    }
    pub fn icon(&self) -> Option<&str> {
        self.kots_application.as_ref().map(|d| d.parsed.spec.icon.as_str()).filter(|i| !i.is_empty())
    }
    pub fn app_spec_raw(&self) -> Option<&str> { self.application.as_ref().map(|d| d.raw.as_str()) }
    pub fn kots_app_spec_raw(&self) -> Option<&str> { self.kots_application.as_ref().map(|d| d.raw.as_str()) }
}

/// Decode a stored `app_spec` column. Empty text means "no document".
pub fn decode_descriptor(raw: &str) -> Result<Option<ApplicationDescriptor>, serde_yaml::Error> {
    if raw.trim().is_empty() { return Ok(None); }
    serde_yaml::from_str(raw).map(Some)
}

/// Decode a stored `kots_app_spec` column. Empty text means "no document".
pub fn decode_kots_application(raw: &str) -> Result<Option<KotsApplication>, serde_yaml::Error> {
    if raw.trim().is_empty() { return Ok(None); }
    serde_yaml::from_str(raw).map(Some)
}

#[async_trait]
pub trait SpecLoader: Send + Sync + 'static {
    async fn load(&self, dir: &Path) -> Result<KotsKinds>;
}

/// Reads every `.yaml`/`.yml` file under a directory (multi-document files included).
#[derive(Debug, Clone, Default)]
pub struct FsSpecLoader;

#[async_trait]
impl SpecLoader for FsSpecLoader {
    async fn load(&self, dir: &Path) -> Result<KotsKinds> {
        let dir: PathBuf = dir.to_path_buf();
        tokio::task::spawn_blocking(move || load_kinds_from_dir(&dir)).await.context("spec loader task")?
    }
}

pub fn load_kinds_from_dir(dir: &Path) -> Result<KotsKinds> {
    if !dir.is_dir() { anyhow::bail!("{} is not a directory", dir.display()); }
    let mut kinds = KotsKinds::default();
    for entry in WalkDir::new(dir).sort_by_file_name().into_iter() {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        let path = entry.path();
        let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
        if !path.is_file() || !is_yaml { continue; }
        let content = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        for doc in split_documents(&content) {
            let value: serde_yaml::Value = serde_yaml::from_str(doc).with_context(|| format!("parse {}", path.display()))?;
            let api_version = value.get("apiVersion").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let kind = value.get("kind").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            if kind != "Application" { continue; }
            if api_version.starts_with("app.k8s.io/") && kinds.application.is_none() {
                let parsed = serde_yaml::from_value(value).with_context(|| format!("decode app.k8s.io Application in {}", path.display()))?;
                kinds.application = Some(SpecDocument { parsed, raw: doc.to_string() });
            } else if api_version.starts_with("kots.io/") && kinds.kots_application.is_none() {
                let parsed = serde_yaml::from_value(value).with_context(|| format!("decode kots.io Application in {}", path.display()))?;
                kinds.kots_application = Some(SpecDocument { parsed, raw: doc.to_string() });
            } else {
                debug!(path=%path.display(), %api_version, "kinds.application_ignored");
            }
        }
    }
    Ok(kinds)
}

fn split_documents(content: &str) -> Vec<&str> {
    let mut docs = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end() == "---" {
            docs.push(&content[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    docs.push(&content[start..]);
    docs.into_iter().map(str::trim).filter(|d| !d.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: &str = "apiVersion: app.k8s.io/v1beta1\nkind: Application\nspec:\n  descriptor:\n    links:\n      - description: UI\n        url: http://svc/ui\n---\napiVersion: kots.io/v1beta1\nkind: Application\nspec:\n  title: Sentry\n  icon: https://img/icon.png\n  ports:\n    - serviceName: web\n      servicePort: 9000\n      localPort: 8080\n      applicationUrl: http://svc/ui\n";

    #[test]
    fn loads_both_application_kinds_from_multi_document_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.yaml"), BOTH).unwrap();
        std::fs::write(dir.path().join("README.md"), "not yaml: [").unwrap();
        let kinds = load_kinds_from_dir(dir.path()).unwrap();
        assert_eq!(kinds.title(), Some("Sentry"));
        assert_eq!(kinds.icon(), Some("https://img/icon.png"));
        let app = kinds.application.unwrap();
        assert_eq!(app.parsed.spec.descriptor.links[0].url, "http://svc/ui");
        assert!(app.raw.starts_with("apiVersion: app.k8s.io"));
        let ports = &kinds.kots_application.unwrap().parsed.spec.application_ports;
        assert_eq!(ports[0].local_port, 8080);
        assert_eq!(ports[0].application_url, "http://svc/ui");
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "kind: [unclosed").unwrap();
        assert!(load_kinds_from_dir(dir.path()).is_err());
    }

    #[test]
    fn empty_stored_documents_decode_to_none() {
        assert!(decode_descriptor("").unwrap().is_none());
        assert!(decode_kots_application("  \n").unwrap().is_none());
    }
}
