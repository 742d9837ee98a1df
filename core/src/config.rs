/// Configuration management
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listen address for the sync API
    pub http_addr: SocketAddr,

    /// TCP command API address for local clients (defaults to 127.0.0.1:(1000 + http_port))
    pub api_addr: SocketAddr,

    /// Optional data directory for the sled stores (defaults to `.dialog/node-<port>`)
    pub data_dir: Option<PathBuf>,

    /// Poll cadence handed to client loops
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".parse().unwrap(),
            api_addr: "127.0.0.1:9080".parse().unwrap(),
            data_dir: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        if args.len() < 2 {
            return Err(ChatError::Config(format!(
                "Usage: {} <port> [--api-port <port>] [--data-dir <path>] [--poll-interval <secs>]",
                args.first().map(String::as_str).unwrap_or("core")
            )));
        }

        let port = args[1]
            .parse::<u16>()
            .map_err(|_| ChatError::Config("Port must be a valid number (0-65535)".to_string()))?;

        let http_addr = format!("0.0.0.0:{}", port)
            .parse()
            .map_err(|_| ChatError::Config("Invalid listen address".to_string()))?;

        let mut api_port: Option<u16> = None;
        let mut data_dir: Option<PathBuf> = None;
        let mut poll_secs: Option<u64> = None;

        let mut i = 2;
        while i < args.len() {
            match args[i].as_str() {
                "--api-port" => {
                    let p = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--api-port requires a port argument".to_string())
                    })?;
                    api_port = Some(p.parse::<u16>().map_err(|_| {
                        ChatError::Config("--api-port must be a valid number (0-65535)".to_string())
                    })?);
                    i += 2;
                }
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    data_dir = Some(PathBuf::from(path));
                    i += 2;
                }
                "--poll-interval" => {
                    let secs = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--poll-interval requires a seconds argument".to_string())
                    })?;
                    poll_secs = Some(secs.parse::<u64>().map_err(|_| {
                        ChatError::Config("--poll-interval must be a number of seconds".to_string())
                    })?);
                    i += 2;
                }
                other => {
                    return Err(ChatError::Config(format!("Unknown argument: {}", other)));
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Some(p) = std::env::var("DIALOG_API_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        {
            api_port = Some(p);
        }
        if let Ok(dir) = std::env::var("DIALOG_DATA_DIR") {
            data_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = std::env::var("DIALOG_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            poll_secs = Some(secs);
        }

        let api_port = api_port.unwrap_or_else(|| port.wrapping_add(1000));
        let api_addr = format!("127.0.0.1:{}", api_port)
            .parse()
            .map_err(|_| ChatError::Config("Invalid api address".to_string()))?;

        Ok(Self {
            http_addr,
            api_addr,
            data_dir,
            poll_interval: poll_secs.map(Duration::from_secs).unwrap_or(DEFAULT_POLL_INTERVAL),
        })
    }

    /// Resolved data directory for the sled stores.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!(".dialog/node-{}", self.http_addr.port())))
    }
}
