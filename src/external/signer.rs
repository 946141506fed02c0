//! Detached CMS signing.
//!
//! The engine treats signing as a black box producing a detached CMS over
//! a byte sequence. The CMS must be deterministic in size for a given
//! certificate and key; the signature filter verifies this between its
//! dry run and the final fixup.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::config::SigningConfig;
use crate::error::{Error, Result};

/// Produces a detached CMS signature over bytes.
pub trait Signer {
    /// Sign the byte sequence, returning DER-encoded CMS.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// `openssl cms`-backed signer.
#[derive(Debug, Clone)]
pub struct OpensslCmsSigner {
    cert: PathBuf,
    key: PathBuf,
    chain: Option<PathBuf>,
}

impl OpensslCmsSigner {
    /// Signer for a certificate/key pair plus optional chain.
    pub fn new(cert: PathBuf, key: PathBuf, chain: Option<PathBuf>) -> Self {
        OpensslCmsSigner { cert, key, chain }
    }
}

impl From<&SigningConfig> for OpensslCmsSigner {
    fn from(config: &SigningConfig) -> Self {
        OpensslCmsSigner::new(config.cert.clone(), config.key.clone(), config.chain.clone())
    }
}

impl Signer for OpensslCmsSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut command = Command::new("openssl");
        command
            .args(["cms", "-sign", "-binary"])
            .arg("-signer")
            .arg(&self.cert)
            .arg("-inkey")
            .arg(&self.key);
        if let Some(chain) = &self.chain {
            command.arg("-certfile").arg(chain);
        }
        command.args(["-outform", "der"]);
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        log::debug!("signing {} bytes via openssl cms", data.len());
        let mut child = command.spawn().map_err(|e| Error::ExternalTool {
            tool: "openssl".to_string(),
            reason: e.to_string(),
        })?;
        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(data)
            .map_err(|e| Error::ExternalTool {
                tool: "openssl".to_string(),
                reason: format!("writing payload: {}", e),
            })?;
        let output = child.wait_with_output().map_err(|e| Error::ExternalTool {
            tool: "openssl".to_string(),
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(Error::ExternalTool {
                tool: "openssl".to_string(),
                reason: format!(
                    "cms signing failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed-size fake signer used across the signature tests.
    pub struct FixedSigner(pub usize);

    impl Signer for FixedSigner {
        fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
            // Deterministic content derived from the payload length.
            let mut cms = vec![0x30u8; self.0];
            if let Some(last) = cms.last_mut() {
                *last = (data.len() & 0xFF) as u8;
            }
            Ok(cms)
        }
    }

    #[test]
    fn test_fixed_signer_is_deterministic_in_size() {
        let signer = FixedSigner(1500);
        assert_eq!(signer.sign(b"").unwrap().len(), 1500);
        assert_eq!(signer.sign(b"payload").unwrap().len(), 1500);
    }

    #[test]
    fn test_missing_openssl_input_is_external_error() {
        let signer = OpensslCmsSigner::new(
            PathBuf::from("/nonexistent/cert.pem"),
            PathBuf::from("/nonexistent/key.pem"),
            None,
        );
        // Either openssl is absent or it rejects the missing files; both
        // surface as an external-tool failure.
        assert!(matches!(
            signer.sign(b"data"),
            Err(Error::ExternalTool { .. })
        ));
    }
}
