use crate::error::{MpiError, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::sync::Arc;

/// ALPN identifier negotiated between hosts.
const ALPN: &[u8] = b"mpiworld/1";

fn tls_err(e: impl std::fmt::Display) -> MpiError {
    MpiError::Tls(e.to_string())
}

/// A host's self-signed TLS identity.
///
/// Hosts inside one cluster trust each other, so the certificate only
/// provides transport encryption, not authentication.
pub(crate) struct HostIdentity {
    cert: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
}

impl HostIdentity {
    pub(crate) fn generate(host_name: &str) -> Result<Self> {
        let params =
            rcgen::CertificateParams::new(vec![host_name.to_string()]).map_err(tls_err)?;
        let key_pair = rcgen::KeyPair::generate().map_err(tls_err)?;
        let cert = params.self_signed(&key_pair).map_err(tls_err)?;
        let key = PrivateKeyDer::try_from(key_pair.serialize_der()).map_err(tls_err)?;
        Ok(Self {
            cert: CertificateDer::from(cert.der().to_vec()),
            key,
        })
    }

    pub(crate) fn server_config(self) -> Result<quinn::ServerConfig> {
        let mut tls = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![self.cert], self.key)
            .map_err(tls_err)?;
        tls.alpn_protocols = vec![ALPN.to_vec()];

        let quic = quinn::crypto::rustls::QuicServerConfig::try_from(Arc::new(tls))
            .map_err(tls_err)?;
        Ok(quinn::ServerConfig::with_crypto(Arc::new(quic)))
    }
}

/// Client configuration that accepts any peer certificate.
pub(crate) fn client_config() -> Result<quinn::ClientConfig> {
    let mut tls = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(TrustClusterPeers))
        .with_no_client_auth();
    tls.alpn_protocols = vec![ALPN.to_vec()];

    let quic =
        quinn::crypto::rustls::QuicClientConfig::try_from(Arc::new(tls)).map_err(tls_err)?;
    Ok(quinn::ClientConfig::new(Arc::new(quic)))
}

#[derive(Debug)]
struct TrustClusterPeers;

impl rustls::client::danger::ServerCertVerifier for TrustClusterPeers {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_builds_server_config() {
        let identity = HostIdentity::generate("localhost").unwrap();
        assert!(!identity.cert.is_empty());
        identity.server_config().unwrap();
    }

    #[test]
    fn test_client_config_builds() {
        client_config().unwrap();
    }
}
