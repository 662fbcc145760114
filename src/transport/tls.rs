//! TLS configuration for secure endpoints
//!
//! Both transports share one [`TlsConfig`] and only differ in the ALPN
//! protocol they negotiate: `http/1.1` for the buffered adapter, `h2` for
//! the multiplexed adapter. Server certificates are validated against the
//! system root store (with the bundled webpki roots as a fallback) or
//! against a custom CA file.

use crate::{Error, Result};
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::Item;
use std::fs;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// TLS configuration for HTTPS origins
///
/// # Examples
///
/// ```ignore
/// // System root certificates (production)
/// let tls = TlsConfig::builder().build()?;
///
/// // Custom CA certificate
/// let tls = TlsConfig::builder()
///     .ca_cert_path("/path/to/ca.pem")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Path to CA certificate file (None = system roots)
    ca_cert_path: Option<String>,
    /// Compiled rustls ClientConfig, without ALPN
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Build a connector negotiating the given ALPN protocols
    pub fn connector(&self, alpn: &[&[u8]]) -> TlsConnector {
        let mut config = (*self.client_config).clone();
        config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
        TlsConnector::from(Arc::new(config))
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_path", &self.ca_cert_path)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration
#[derive(Debug, Default)]
pub struct TlsConfigBuilder {
    ca_cert_path: Option<String>,
}

impl TlsConfigBuilder {
    /// Set the path to a custom CA certificate file (PEM format)
    ///
    /// If not set, system root certificates are used.
    pub fn ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Build the TLS configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the CA certificate file cannot be read or
    /// contains no valid certificates, or if no root certificates can be
    /// loaded at all.
    pub fn build(self) -> Result<TlsConfig> {
        let root_store = if let Some(ca_path) = &self.ca_cert_path {
            load_custom_ca(ca_path)?
        } else {
            let result = rustls_native_certs::load_native_certs();

            let mut store = RootCertStore::empty();
            for cert in result.certs {
                let _ = store.add_parsable_certificates(std::iter::once(cert));
            }

            // Fall back to the bundled webpki roots if the platform store
            // yielded nothing usable
            if store.is_empty() {
                store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }

            if store.is_empty() {
                return Err(Error::Config(
                    "failed to load any root certificates".to_string(),
                ));
            }

            store
        };

        let client_config = Arc::new(
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );

        Ok(TlsConfig {
            ca_cert_path: self.ca_cert_path,
            client_config,
        })
    }
}

/// Load a custom CA certificate from a PEM file
fn load_custom_ca(ca_path: &str) -> Result<RootCertStore> {
    let ca_cert_data = fs::read(ca_path).map_err(|e| {
        Error::Config(format!(
            "failed to read CA certificate file '{}': {}",
            ca_path, e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut root_store = RootCertStore::empty();
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += 1;
            }
            Ok(Some(_)) => {
                // Skip non-certificate items (private keys, etc.)
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Config(format!(
                    "failed to parse CA certificate from '{}'",
                    ca_path
                )));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Config(format!(
            "no valid certificates found in '{}'",
            ca_path
        )));
    }

    Ok(root_store)
}

/// Parse a hostname into a TLS server name (SNI)
pub(crate) fn server_name(hostname: &str) -> Result<rustls_pki_types::ServerName<'static>> {
    let hostname = hostname.trim_end_matches('.');

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Config(format!(
            "invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    rustls_pki_types::ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Config(format!("invalid hostname for TLS: '{}'", hostname)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = TlsConfigBuilder::default();
        assert!(builder.ca_cert_path.is_none());
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let result = TlsConfig::builder()
            .ca_cert_path("/nonexistent/ca.pem")
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_server_name_rejects_empty() {
        assert!(server_name("").is_err());
        assert!(server_name("db.example.com").is_ok());
    }

    #[test]
    fn test_connector_sets_alpn() {
        // Only checks that building a connector with ALPN succeeds
        if let Ok(tls) = TlsConfig::builder().build() {
            let _h1 = tls.connector(&[b"http/1.1"]);
            let _h2 = tls.connector(&[b"h2"]);
        }
    }
}
