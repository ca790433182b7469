pub mod prompt;

use crate::cli::Args;
use crate::llm::LlmConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OPENROUTER_API_KEY is missing. Set it in the environment or in a .env file.")]
    MissingApiKey,
    #[error("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.")]
    IncompleteTls,
    #[error("Invalid SERVER_ADDR '{0}': expected host:port")]
    InvalidServerAddr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

/// Validated runtime configuration built from the command line and environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub server_addr: String,
    pub http_port: u16,
    pub public_ws_url: String,
    pub prompts_path: Option<String>,
    pub tls: Option<TlsPaths>,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let api_key = args.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?
            .to_string();

        let tls = if args.enable_tls {
            match (&args.tls_cert_path, &args.tls_key_path) {
                (Some(cert_path), Some(key_path)) =>
                    Some(TlsPaths {
                        cert_path: cert_path.clone(),
                        key_path: key_path.clone(),
                    }),
                _ => {
                    return Err(ConfigError::IncompleteTls);
                }
            }
        } else {
            None
        };

        let port = args.server_addr
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse::<u16>().ok())
            .ok_or_else(|| ConfigError::InvalidServerAddr(args.server_addr.clone()))?;

        let public_ws_url = match &args.public_ws_url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => {
                let scheme = if tls.is_some() { "wss" } else { "ws" };
                format!("{}://localhost:{}", scheme, port)
            }
        };

        Ok(Self {
            llm: LlmConfig {
                api_key,
                base_url: args.chat_base_url.clone(),
                chat_model: args.chat_model.clone(),
                vision_model: args.vision_model.clone(),
            },
            server_addr: args.server_addr.clone(),
            http_port: args.http_port,
            public_ws_url,
            prompts_path: args.prompts_path.clone().filter(|p| !p.trim().is_empty()),
            tls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["stitchy"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let mut args = parse(&[]);
        args.api_key = None;
        let err = AppConfig::from_args(&args).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let args = parse(&["--api-key", "   "]);
        assert_eq!(AppConfig::from_args(&args).unwrap_err(), ConfigError::MissingApiKey);
    }

    #[test]
    fn tls_requires_both_paths() {
        let args = parse(&["--api-key", "k", "--enable-tls", "--tls-cert-path", "cert.pem"]);
        assert_eq!(AppConfig::from_args(&args).unwrap_err(), ConfigError::IncompleteTls);
    }

    #[test]
    fn derives_page_websocket_url_from_server_addr() {
        let mut args = parse(&["--api-key", "k", "--server-addr", "0.0.0.0:4100"]);
        args.public_ws_url = None;
        let config = AppConfig::from_args(&args).unwrap();
        assert_eq!(config.public_ws_url, "ws://localhost:4100");
        assert_eq!(config.llm.api_key, "k");
        assert!(config.tls.is_none());
    }

    #[test]
    fn rejects_server_addr_without_port() {
        let args = parse(&["--api-key", "k", "--server-addr", "localhost"]);
        assert!(matches!(
            AppConfig::from_args(&args),
            Err(ConfigError::InvalidServerAddr(_))
        ));
    }
}
