use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "back", about = "Todo list HTTP service")]
pub struct Args {
    /// SQLite database file, created if missing.
    #[arg(long, env = "TODO_DATABASE", default_value = "db.sqlite")]
    pub database: PathBuf,

    #[arg(long, env = "TODO_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Seconds before an unfinished request is abandoned.
    #[arg(long, env = "TODO_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// PEM certificate; serves HTTPS together with `--tls-key`.
    #[arg(long, env = "SSL_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "SSL_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn tls(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.tls_cert.as_ref().zip(self.tls_key.as_ref())
    }
}
