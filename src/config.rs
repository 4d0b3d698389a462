use std::net::SocketAddr;
use std::time::Duration;

use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Parser};

/// Application-level constants
pub const APP_NAME: &str = "MediVault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-file upload bound (50 MB). Each slot is checked independently.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// OCR.space public parse endpoint.
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// OCR.space public demo key. Rate limited; set `OCR_SPACE_API_KEY` in production.
pub const DEFAULT_OCR_API_KEY: &str = "helloworld";

pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Upper bound for a single OCR round-trip, in seconds.
pub const DEFAULT_OCR_TIMEOUT_SECS: &str = "30";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Default tracing filter when `RUST_LOG` is not set. Debug builds log the
/// crate and the HTTP layer at debug level.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,medivault_lib=debug,tower_http=debug"
    } else {
        "info"
    }
}

/// Runtime service configuration.
///
/// Every option can be given as a CLI argument or an environment variable;
/// `run()` loads a `.env` file first so its values act as defaults.
///
/// ```bash
/// MEDIVAULT_BIND_ADDR=0.0.0.0:8080 OCR_SPACE_API_KEY=... medivault
/// medivault --bind-addr 0.0.0.0:8080 --ocr-timeout-secs 10
/// ```
#[derive(Debug, Clone, Parser)]
#[command(name = "medivault")]
#[command(about = "Prescription photo parser service")]
#[command(version)]
pub struct ServiceConfig {
    /// Socket address the HTTP API listens on.
    #[arg(long, env = "MEDIVAULT_BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,

    /// External OCR service connection.
    #[command(flatten)]
    pub ocr: OcrServiceConfig,

    /// Largest accepted file per slot, in bytes.
    #[arg(long, env = "MEDIVAULT_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

/// Connection settings for the external OCR service.
#[derive(Debug, Clone, Args)]
pub struct OcrServiceConfig {
    /// OCR.space parse endpoint URL.
    #[arg(
        long = "ocr-endpoint",
        env = "OCR_SPACE_ENDPOINT",
        default_value = DEFAULT_OCR_ENDPOINT,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub endpoint: String,

    /// OCR.space API key.
    #[arg(
        long = "ocr-api-key",
        env = "OCR_SPACE_API_KEY",
        default_value = DEFAULT_OCR_API_KEY,
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub api_key: String,

    /// OCR language code sent with every request.
    #[arg(
        long = "ocr-language",
        env = "OCR_LANGUAGE",
        default_value = DEFAULT_OCR_LANGUAGE,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub language: String,

    /// Timeout for one OCR call, in whole seconds (at least 1).
    #[arg(
        long = "ocr-timeout-secs",
        env = "OCR_TIMEOUT_SECS",
        default_value = DEFAULT_OCR_TIMEOUT_SECS,
        value_parser = parse_timeout_secs
    )]
    pub timeout: Duration,
}

fn parse_timeout_secs(value: &str) -> Result<Duration, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err("timeout must be at least 1 second".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(format!("invalid number of seconds: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<ServiceConfig, clap::Error> {
        ServiceConfig::try_parse_from(std::iter::once("medivault").chain(args.iter().copied()))
    }

    #[test]
    fn command_definition_is_valid() {
        ServiceConfig::command().debug_assert();
    }

    #[test]
    fn defaults_without_arguments() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.ocr.endpoint, DEFAULT_OCR_ENDPOINT);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_applied() {
        let config = parse(&[
            "--bind-addr",
            "0.0.0.0:8080",
            "--ocr-api-key",
            "secret",
            "--ocr-timeout-secs",
            "5",
            "--max-upload-bytes",
            "1024",
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.ocr.api_key, "secret");
        assert_eq!(config.ocr.timeout, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--ocr-timeout-secs", "soon"]).is_err());
        assert!(parse(&["--ocr-timeout-secs", "0"]).is_err());
        assert!(parse(&["--bind-addr", "not-an-address"]).is_err());
        assert!(parse(&["--max-upload-bytes", "-1"]).is_err());
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(parse(&["--ocr-api-key", ""]).is_err());
    }

    #[test]
    fn timeout_parser_trims_input() {
        assert_eq!(parse_timeout_secs(" 12 "), Ok(Duration::from_secs(12)));
    }

    #[test]
    fn app_name_is_medivault() {
        assert_eq!(APP_NAME, "MediVault");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
