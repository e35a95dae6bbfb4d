//! On-disk context store

use super::{
    ClientContext, ContextSelection, DEFAULT_CONTEXT_NAME, TLS_CA_FILE, TLS_CERT_FILE,
    TLS_KEY_FILE, TlsMaterial, context_digest,
};
use crate::error::ContextError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const META_FILE: &str = "meta.json";
const DOCKER_ENDPOINT: &str = "docker";

#[derive(Debug, Default, Deserialize)]
struct CliConfigFile {
    #[serde(rename = "currentContext", default)]
    current_context: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContextMetaFile {
    #[serde(rename = "Endpoints", default)]
    endpoints: HashMap<String, EndpointMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct EndpointMeta {
    #[serde(rename = "Host", default)]
    host: Option<String>,
    #[serde(rename = "SkipTLSVerify", default)]
    skip_tls_verify: bool,
}

/// Read-only view of a docker configuration directory
#[derive(Debug, Clone)]
pub struct ContextStore {
    root: PathBuf,
}

impl ContextStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the store from the process environment
    pub fn from_env() -> Result<Self, ContextError> {
        Self::locate(|key| std::env::var(key).ok())
    }

    /// `$DOCKER_CONFIG` if set, otherwise `$HOME/.docker`
    pub fn locate<F>(lookup: F) -> Result<Self, ContextError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DOCKER_CONFIG").filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }
        let home = lookup("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(ContextError::HomeDirUnavailable)?;
        Ok(Self::new(Path::new(&home).join(".docker")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.root
            .join("contexts")
            .join("meta")
            .join(context_digest(name))
            .join(META_FILE)
    }

    pub fn tls_dir(&self, name: &str) -> PathBuf {
        self.root
            .join("contexts")
            .join("tls")
            .join(context_digest(name))
            .join(DOCKER_ENDPOINT)
    }

    /// Resolve a context by name, or the current one when `use_current` is set
    pub fn resolve(&self, name: &str, use_current: bool) -> Result<ClientContext, ContextError> {
        if name.is_empty() && !use_current {
            return Err(ContextError::NoContextSpecified);
        }

        let name = if use_current {
            self.current_context_name()?
        } else {
            name.to_string()
        };
        self.resolve_named(&name)
    }

    /// Resolve whatever the command line selected
    pub fn resolve_selection(
        &self,
        selection: &ContextSelection,
    ) -> Result<ClientContext, ContextError> {
        match selection {
            ContextSelection::None => Err(ContextError::NoContextSpecified),
            ContextSelection::Named(name) => self.resolve(name, false),
            ContextSelection::Current => self.resolve("", true),
        }
    }

    /// Name stored as `currentContext` in the global config file
    pub fn current_context_name(&self) -> Result<String, ContextError> {
        let path = self.config_path();
        let bytes = std::fs::read(&path).map_err(|source| ContextError::ConfigUnreadable {
            path: path.clone(),
            source,
        })?;
        let config: CliConfigFile = parse_json(&bytes)
            .map_err(|source| ContextError::ConfigMalformed { path, source })?;

        config
            .current_context
            .filter(|name| !name.is_empty())
            .ok_or(ContextError::CurrentContextUndefined)
    }

    fn resolve_named(&self, name: &str) -> Result<ClientContext, ContextError> {
        if name == DEFAULT_CONTEXT_NAME {
            return Ok(ClientContext::default_context());
        }

        let path = self.meta_path(name);
        let bytes = std::fs::read(&path).map_err(|source| ContextError::MetadataUnreadable {
            path: path.clone(),
            source,
        })?;
        let mut meta: ContextMetaFile = parse_json(&bytes)
            .map_err(|source| ContextError::MetadataMalformed { path, source })?;

        let endpoint = meta.endpoints.remove(DOCKER_ENDPOINT).unwrap_or_default();

        Ok(ClientContext {
            name: name.to_string(),
            endpoint_host: endpoint.host.filter(|h| !h.is_empty()),
            skip_tls_verify: endpoint.skip_tls_verify,
            tls: self.tls_material(name),
        })
    }

    /// TLS paths, only when all three files are present in the context's TLS directory
    fn tls_material(&self, name: &str) -> Option<TlsMaterial> {
        let dir = self.tls_dir(name);
        let present: HashSet<String> = std::fs::read_dir(&dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();

        let complete = [TLS_CA_FILE, TLS_CERT_FILE, TLS_KEY_FILE]
            .iter()
            .all(|file| present.contains(*file));
        if !complete {
            return None;
        }

        Some(TlsMaterial {
            ca_path: dir.join(TLS_CA_FILE),
            cert_path: dir.join(TLS_CERT_FILE),
            key_path: dir.join(TLS_KEY_FILE),
        })
    }
}

fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}
