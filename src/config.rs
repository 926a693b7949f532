// src/config.rs
use clap::Parser;
use std::net::SocketAddr;

/// PC/SC tag reader that pushes inspection reports to WebSocket clients.
#[derive(Parser, Debug, Clone)]
#[command(name = "nfc-reader-rust", version, about)]
pub struct Config {
    /// Address the WebSocket server listens on
    #[arg(long, env = "NFC_READER_BIND", default_value = "127.0.0.1:3500")]
    pub bind: SocketAddr,

    /// How long one wait for reader events lasts, in milliseconds
    #[arg(long, env = "NFC_READER_POLL_MS", default_value_t = 500)]
    pub poll_ms: u64,

    /// Scanned IDs kept for export; 0 keeps all
    #[arg(long, env = "NFC_READER_HISTORY_LIMIT", default_value_t = 0)]
    pub history_limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["nfc-reader-rust"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:3500".parse::<SocketAddr>().unwrap());
        assert_eq!(config.poll_ms, 500);
        assert_eq!(config.history_limit, 0);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "nfc-reader-rust",
            "--bind",
            "0.0.0.0:9000",
            "--history-limit",
            "10",
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.history_limit, 10);
    }
}
