//! The MITM proxy's runtime-generated certificate authority: generated (or
//! loaded) once at startup, stored under the manager's private directory,
//! and used to sign per-host leaf certificates on the fly (spec.md §4.6,
//! §6: `ca-cert.pem`, `ca-key.pem`).

use std::io::Write as _;
use std::path::{Path, PathBuf};

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, Issuer, IsCa, KeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
};

use crate::error::{ProxyError, ProxyResult};

/// The proxy's CA: holds the signing issuer plus the cert's PEM text for
/// distribution to clients (`ca-cert.pem`, world-readable).
pub struct CertificateAuthority {
    issuer: Issuer<'static, KeyPair>,
    cert_pem: String,
}

impl CertificateAuthority {
    /// Load the CA from `cert_path`/`key_path` if both exist, otherwise
    /// generate a fresh self-signed CA and persist it there. The cert is
    /// written world-readable; the key is written `0600`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::CaLoadFailed`], [`ProxyError::CaGenerationFailed`],
    /// or [`ProxyError::CaPersistFailed`] as appropriate.
    pub fn load_or_generate(cert_path: &Path, key_path: &Path) -> ProxyResult<Self> {
        if cert_path.exists() && key_path.exists() {
            return Self::load(cert_path, key_path);
        }

        let (cert_pem, key_pem) = generate_ca()?;
        write_file(cert_path, cert_pem.as_bytes(), 0o644)?;
        write_file(key_path, key_pem.as_bytes(), 0o600)?;

        let key_pair = KeyPair::from_pem(&key_pem).map_err(|e| ProxyError::CaGenerationFailed(e.to_string()))?;
        let issuer = Issuer::from_ca_cert_pem(&cert_pem, key_pair).map_err(|e| ProxyError::CaGenerationFailed(e.to_string()))?;
        Ok(Self { issuer, cert_pem })
    }

    fn load(cert_path: &Path, key_path: &Path) -> ProxyResult<Self> {
        let cert_pem = std::fs::read_to_string(cert_path)
            .map_err(|e| ProxyError::CaLoadFailed { path: cert_path.to_path_buf(), reason: e.to_string() })?;
        let key_pem = std::fs::read_to_string(key_path)
            .map_err(|e| ProxyError::CaLoadFailed { path: key_path.to_path_buf(), reason: e.to_string() })?;
        let key_pair = KeyPair::from_pem(&key_pem).map_err(|e| ProxyError::CaLoadFailed { path: key_path.to_path_buf(), reason: e.to_string() })?;
        let issuer = Issuer::from_ca_cert_pem(&cert_pem, key_pair)
            .map_err(|e| ProxyError::CaLoadFailed { path: cert_path.to_path_buf(), reason: e.to_string() })?;
        Ok(Self { issuer, cert_pem })
    }

    /// The CA certificate PEM, for trust installation (spec.md §6).
    #[must_use]
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Mint a leaf certificate (cert PEM, key PEM) for `host`, signed by
    /// this CA.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::LeafIssuanceFailed`] if certificate generation
    /// or signing fails.
    pub fn issue_leaf(&self, host: &str) -> ProxyResult<(String, String)> {
        let mut params = if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            let mut params = CertificateParams::new(Vec::new()).map_err(|e| ProxyError::LeafIssuanceFailed { host: host.to_string(), reason: e.to_string() })?;
            params.subject_alt_names.push(rcgen::SanType::IpAddress(ip));
            params
        } else {
            CertificateParams::new(vec![host.to_string()]).map_err(|e| ProxyError::LeafIssuanceFailed { host: host.to_string(), reason: e.to_string() })?
        };
        params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];

        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| ProxyError::LeafIssuanceFailed { host: host.to_string(), reason: e.to_string() })?;
        let cert = params
            .signed_by(&key_pair, &self.issuer)
            .map_err(|e| ProxyError::LeafIssuanceFailed { host: host.to_string(), reason: e.to_string() })?;

        Ok((cert.pem(), key_pair.serialize_pem()))
    }
}

fn generate_ca() -> ProxyResult<(String, String)> {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "Leash MITM CA");
    params.distinguished_name = dn;

    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).map_err(|e| ProxyError::CaGenerationFailed(e.to_string()))?;
    let cert = params.self_signed(&key_pair).map_err(|e| ProxyError::CaGenerationFailed(e.to_string()))?;
    Ok((cert.pem(), key_pair.serialize_pem()))
}

fn write_file(path: &Path, contents: &[u8], mode: u32) -> ProxyResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| ProxyError::CaPersistFailed { path: path.to_path_buf(), source })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| ProxyError::CaPersistFailed { path: path.to_path_buf(), source })?;
    tmp.write_all(contents).map_err(|source| ProxyError::CaPersistFailed { path: path.to_path_buf(), source })?;
    tmp.as_file().sync_all().map_err(|source| ProxyError::CaPersistFailed { path: path.to_path_buf(), source })?;
    set_mode(tmp.path(), mode)?;
    tmp.persist(path).map_err(|e| ProxyError::CaPersistFailed { path: path.to_path_buf(), source: e.error })?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> ProxyResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|source| ProxyError::CaPersistFailed { path: path.to_path_buf(), source })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> ProxyResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_reloads_ca() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("ca-cert.pem");
        let key_path = dir.path().join("ca-key.pem");

        let ca = CertificateAuthority::load_or_generate(&cert_path, &key_path).unwrap();
        assert!(ca.cert_pem().contains("BEGIN CERTIFICATE"));

        let reloaded = CertificateAuthority::load_or_generate(&cert_path, &key_path).unwrap();
        assert_eq!(ca.cert_pem(), reloaded.cert_pem());
    }

    #[test]
    fn issues_leaf_certificate_for_host() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::load_or_generate(&dir.path().join("ca-cert.pem"), &dir.path().join("ca-key.pem")).unwrap();
        let (cert_pem, key_pem) = ca.issue_leaf("api.anthropic.com").unwrap();
        assert!(cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(key_pem.contains("PRIVATE KEY"));
    }
}
