use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::TlsPaths;
use crate::error::ConfigError;

/// Checks that the configured PEM files hold at least one certificate and a
/// private key before the server commits to HTTPS/WSS.
pub fn check_tls_material(paths: &TlsPaths) -> Result<(), ConfigError> {
    let mut cert_reader = open(&paths.cert)?;
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| io_error(&paths.cert, source))?;
    if certs.is_empty() {
        return Err(ConfigError::MissingPem {
            kind: "certificate",
            path: paths.cert.display().to_string(),
        });
    }

    let mut key_reader = open(&paths.key)?;
    match rustls_pemfile::private_key(&mut key_reader) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ConfigError::MissingPem {
            kind: "private key",
            path: paths.key.display().to_string(),
        }),
        Err(source) => Err(io_error(&paths.key, source)),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("chat-relay-{}.pem", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_files_are_reported() {
        let paths = TlsPaths {
            cert: "/nonexistent/cert.pem".into(),
            key: "/nonexistent/key.pem".into(),
        };
        assert!(matches!(check_tls_material(&paths), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn files_without_pem_blocks_are_rejected() {
        let cert = scratch_file("not a certificate\n");
        let key = scratch_file("not a key\n");
        let result = check_tls_material(&TlsPaths {
            cert: cert.clone(),
            key: key.clone(),
        });
        assert!(matches!(
            result,
            Err(ConfigError::MissingPem { kind: "certificate", .. })
        ));
        let _ = std::fs::remove_file(cert);
        let _ = std::fs::remove_file(key);
    }
}
