//! # TLS Provisioning
//!
//! Generates the TLS material for secure channels and builds the rustls
//! configurations for both sides.
//!
//! A secure server gets an ephemeral CA and a leaf certificate signed by it,
//! valid for `localhost`, the loopback addresses and the host it binds.
//! A secure client by default skips server certificate verification: both
//! ends are assumed to be run by the same operator on a point-to-point link.
//! Clients that need a real check use [`ClientTrust::CaPem`] with the CA
//! exposed by the server handle.

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerConfig, ServerName};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, instrument, warn};

use crate::error::{ChannelError, Result};

/// How a secure client checks the server certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientTrust {
    /// Accept any server certificate
    #[default]
    SkipVerification,
    /// Only accept certificates issued by this PEM-encoded CA
    CaPem(String),
}

/// TLS material generated for one secure server
pub struct Provisioned {
    /// Listening side, presenting the generated leaf certificate
    pub server: Arc<ServerConfig>,
    /// Connecting side, trusting only the generated CA
    pub client: Arc<ClientConfig>,
    /// PEM encoding of the generated CA certificate
    pub ca_pem: String,
}

fn cert_error(e: rcgen::Error) -> ChannelError {
    ChannelError::CertificateError(e.to_string())
}

/// Default identities a generated server certificate is valid for
pub fn default_identities(address: &str) -> Vec<String> {
    let mut names = vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ];
    let host = host_of(address);
    if !host.is_empty() && !names.iter().any(|n| n == host) {
        names.push(host.to_string());
    }
    names
}

/// Generate a CA, a leaf certificate for `identities`, and both TLS configs
#[instrument(skip_all, fields(identities = ?identities))]
pub fn provision(identities: &[String]) -> Result<Provisioned> {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).map_err(cert_error)?;
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "rpc-channel ephemeral CA");
    ca_params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let ca_key = KeyPair::generate().map_err(cert_error)?;
    let ca_cert = ca_params.self_signed(&ca_key).map_err(cert_error)?;

    let mut leaf_params = CertificateParams::new(identities.to_vec()).map_err(cert_error)?;
    leaf_params
        .distinguished_name
        .push(DnType::CommonName, "rpc-channel server");
    leaf_params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    leaf_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    let leaf_key = KeyPair::generate().map_err(cert_error)?;
    let leaf_cert = leaf_params
        .signed_by(&leaf_key, &ca_cert, &ca_key)
        .map_err(cert_error)?;

    let chain = vec![
        Certificate(leaf_cert.der().to_vec()),
        Certificate(ca_cert.der().to_vec()),
    ];
    let server = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(chain, PrivateKey(leaf_key.serialize_der()))
        .map_err(|e| ChannelError::CertificateError(format!("TLS error: {e}")))?;

    let ca_pem = ca_cert.pem();
    let client = verifying_client_config(&ca_pem)?;

    debug!("Generated ephemeral CA and server certificate");
    Ok(Provisioned {
        server: Arc::new(server),
        client: Arc::new(client),
        ca_pem,
    })
}

/// Client config for the given trust setting
pub fn client_config(trust: &ClientTrust) -> Result<Arc<ClientConfig>> {
    match trust {
        ClientTrust::SkipVerification => {
            warn!("Server certificate verification is disabled for this secure client");
            let config = ClientConfig::builder()
                .with_safe_defaults()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_no_client_auth();
            Ok(Arc::new(config))
        }
        ClientTrust::CaPem(pem) => Ok(Arc::new(verifying_client_config(pem)?)),
    }
}

fn verifying_client_config(ca_pem: &str) -> Result<ClientConfig> {
    let ders = rustls_pemfile::certs(&mut ca_pem.as_bytes())
        .map_err(|_| ChannelError::Tls("Failed to parse CA certificate".into()))?;
    if ders.is_empty() {
        return Err(ChannelError::Tls("No CA certificate found".into()));
    }

    let mut roots = RootCertStore::empty();
    for der in ders {
        roots
            .add(&Certificate(der))
            .map_err(|e| ChannelError::Tls(format!("Failed to add CA cert: {e}")))?;
    }

    Ok(ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

/// Name presented for SNI and checked against the certificate
pub fn server_name(address: &str) -> Result<ServerName> {
    let host = host_of(address);
    ServerName::try_from(host)
        .or_else(|_| ServerName::try_from("localhost"))
        .map_err(|_| ChannelError::Tls(format!("Invalid server name in {address}")))
}

/// Host part of `host:port`, without IPv6 brackets
fn host_of(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => address,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
