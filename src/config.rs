use std::net::SocketAddr;
use std::path::PathBuf;

use warp::http::uri::Authority;
use warp::http::HeaderValue;

use crate::error::ConfigError;

const DEFAULT_ADDR: &str = "0.0.0.0:2052";
const DEFAULT_OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub cors: CorsOrigins,
    pub tls: Option<TlsPaths>,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
    /// Whether `new-message` is also delivered back to the connection that sent it.
    pub echo_to_sender: bool,
    /// Shared secret for the notify route. `None` disables the route.
    pub notify_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 2052)),
            cors: CorsOrigins::Any,
            tls: None,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            echo_to_sender: false,
            notify_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup("RELAY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr.parse().map_err(|_| ConfigError::InvalidValue {
            var: "RELAY_ADDR",
            value: raw_addr.clone(),
        })?;

        let cors = match lookup("CORS_ORIGIN") {
            None => CorsOrigins::Any,
            Some(raw) => parse_origins(&raw)?,
        };

        let tls = match (lookup("TLS_CERT_PATH"), lookup("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::IncompleteTls("TLS_CERT_PATH", "TLS_KEY_PATH"))
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteTls("TLS_KEY_PATH", "TLS_CERT_PATH"))
            }
            (None, None) => None,
        };

        let outbound_buffer = match lookup("RELAY_OUTBOUND_BUFFER") {
            None => DEFAULT_OUTBOUND_BUFFER,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "RELAY_OUTBOUND_BUFFER",
                        value: raw,
                    })
                }
            },
        };

        let echo_to_sender = match lookup("RELAY_ECHO_TO_SENDER") {
            None => false,
            Some(raw) => parse_flag("RELAY_ECHO_TO_SENDER", raw)?,
        };

        let notify_token = lookup("RELAY_NOTIFY_TOKEN").filter(|token| !token.is_empty());

        Ok(Self {
            addr,
            cors,
            tls,
            outbound_buffer,
            echo_to_sender,
            notify_token,
        })
    }
}

fn parse_origins(raw: &str) -> Result<CorsOrigins, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.iter().any(|origin| origin == "*") {
        return Ok(CorsOrigins::Any);
    }
    if origins.is_empty() || !origins.iter().all(|origin| is_valid_origin(origin)) {
        return Err(ConfigError::InvalidValue {
            var: "CORS_ORIGIN",
            value: raw.to_string(),
        });
    }
    Ok(CorsOrigins::List(origins))
}

/// `scheme://host[:port]` with no path or userinfo, the only shape the CORS
/// layer accepts without panicking.
fn is_valid_origin(origin: &str) -> bool {
    let Some((scheme, host)) = origin.split_once("://") else {
        return false;
    };
    if !matches!(scheme, "http" | "https") || host.contains('@') {
        return false;
    }
    host.parse::<Authority>().is_ok() && HeaderValue::from_str(origin).is_ok()
}

fn parse_flag(var: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.addr, Config::default().addr);
        assert_eq!(config.cors, CorsOrigins::Any);
        assert!(config.tls.is_none());
        assert_eq!(config.outbound_buffer, 256);
        assert!(!config.echo_to_sender);
        assert!(config.notify_token.is_none());
    }

    #[test]
    fn reads_origin_list() {
        let config =
            config_from(&[("CORS_ORIGIN", "https://app.example.com, http://localhost:3000")])
                .unwrap();
        assert_eq!(
            config.cors,
            CorsOrigins::List(vec![
                "https://app.example.com".to_string(),
                "http://localhost:3000".to_string()
            ])
        );
        assert_eq!(config_from(&[("CORS_ORIGIN", "*")]).unwrap().cors, CorsOrigins::Any);
        assert_eq!(
            config_from(&[("CORS_ORIGIN", "http://127.0.0.1:8080")]).unwrap().cors,
            CorsOrigins::List(vec!["http://127.0.0.1:8080".to_string()])
        );
        assert!(config_from(&[("CORS_ORIGIN", " , ")]).is_err());
        assert!(config_from(&[("CORS_ORIGIN", "app.example.com")]).is_err());
        assert!(config_from(&[("CORS_ORIGIN", "https://app.example.com/")]).is_err());
    }

    #[test]
    fn reads_relay_settings() {
        let config = config_from(&[
            ("RELAY_ADDR", "127.0.0.1:9000"),
            ("RELAY_OUTBOUND_BUFFER", "32"),
            ("RELAY_ECHO_TO_SENDER", "true"),
            ("RELAY_NOTIFY_TOKEN", "s3cret"),
        ])
        .unwrap();
        assert_eq!(config.addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(config.outbound_buffer, 32);
        assert!(config.echo_to_sender);
        assert_eq!(config.notify_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config_from(&[("RELAY_ADDR", "not-an-addr")]).is_err());
        assert!(config_from(&[("RELAY_OUTBOUND_BUFFER", "0")]).is_err());
        assert!(config_from(&[("RELAY_ECHO_TO_SENDER", "maybe")]).is_err());

        let err = config_from(&[("CORS_ORIGIN", "https://exa mple.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "CORS_ORIGIN", .. }));
        let mixed = "https://ok.example.com, http://bad host";
        assert!(config_from(&[("CORS_ORIGIN", mixed)]).is_err());
        assert!(config_from(&[("CORS_ORIGIN", "https://user@example.com")]).is_err());
        assert!(config_from(&[("CORS_ORIGIN", "ftp://example.com")]).is_err());
    }

    #[test]
    fn tls_needs_both_paths() {
        let err = config_from(&[("TLS_CERT_PATH", "cert.pem")]).unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteTls("TLS_CERT_PATH", _)));

        let config =
            config_from(&[("TLS_CERT_PATH", "cert.pem"), ("TLS_KEY_PATH", "key.pem")]).unwrap();
        assert_eq!(
            config.tls,
            Some(TlsPaths {
                cert: "cert.pem".into(),
                key: "key.pem".into()
            })
        );
    }
}
