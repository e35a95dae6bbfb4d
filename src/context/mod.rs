//! Docker CLI context resolution
//!
//! A context is a named bundle of connection parameters stored under the user's
//! docker configuration directory. Files for a context live in directories named
//! after the SHA-256 digest of the context name:
//!
//! ```text
//! <root>/config.json                                 {"currentContext": "..."}
//! <root>/contexts/meta/<digest>/meta.json            {"Endpoints": {"docker": {"Host": "..."}}}
//! <root>/contexts/tls/<digest>/docker/{ca,cert,key}.pem
//! ```

pub mod store;

pub use store::ContextStore;

use sha2::{Digest, Sha256};
use std::path::PathBuf;

pub const TLS_CA_FILE: &str = "ca.pem";
pub const TLS_CERT_FILE: &str = "cert.pem";
pub const TLS_KEY_FILE: &str = "key.pem";

/// Name of the built-in context that has no files on disk
pub const DEFAULT_CONTEXT_NAME: &str = "default";

/// Paths of the three TLS files of a context. Contents are not read here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// A resolved client context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub name: String,
    pub endpoint_host: Option<String>,
    pub skip_tls_verify: bool,
    pub tls: Option<TlsMaterial>,
}

impl ClientContext {
    /// The built-in context, which means "use environment defaults"
    pub fn default_context() -> Self {
        Self {
            name: DEFAULT_CONTEXT_NAME.to_string(),
            endpoint_host: None,
            skip_tls_verify: false,
            tls: None,
        }
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_CONTEXT_NAME && self.endpoint_host.is_none()
    }
}

/// Which context the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContextSelection {
    #[default]
    None,
    Named(String),
    Current,
}

impl ContextSelection {
    /// `--current-context` wins over `--context`
    pub fn from_flags(name: Option<&str>, use_current: bool) -> Self {
        if use_current {
            return ContextSelection::Current;
        }
        match name {
            Some(name) if !name.is_empty() => ContextSelection::Named(name.to_string()),
            _ => ContextSelection::None,
        }
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self, ContextSelection::None)
    }
}

/// Hex-encoded SHA-256 of a context name, used as its directory name
pub fn context_digest(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_digest_is_sha256_hex() {
        assert_eq!(
            context_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(context_digest("prod").len(), 64);
        assert_eq!(context_digest("prod"), context_digest("prod"));
        assert_ne!(context_digest("prod"), context_digest("staging"));
    }

    #[test]
    fn test_selection_from_flags() {
        assert_eq!(ContextSelection::from_flags(None, false), ContextSelection::None);
        assert_eq!(ContextSelection::from_flags(Some(""), false), ContextSelection::None);
        assert_eq!(
            ContextSelection::from_flags(Some("prod"), false),
            ContextSelection::Named("prod".to_string())
        );
        assert_eq!(
            ContextSelection::from_flags(Some("prod"), true),
            ContextSelection::Current
        );
        assert!(!ContextSelection::None.is_requested());
    }

    #[test]
    fn test_default_context() {
        let ctx = ClientContext::default_context();
        assert!(ctx.is_default());
        assert!(ctx.tls.is_none());
    }
}
