use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:8788";

#[derive(Debug, Clone, Parser)]
#[command(name = "meme_rounds_server")]
#[command(about = "Caption-matching party game server", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on (host:port)
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// JSON file holding the card and visual content
    #[arg(long, env = "CONTENT_PATH", default_value = "content.json")]
    pub content_path: PathBuf,

    /// Minimum seconds between content reloads
    #[arg(long, env = "CONTENT_REFRESH_SECS", default_value_t = 60)]
    pub content_refresh_secs: u64,

    /// Base URL clients prefix to visual filenames
    #[arg(long, env = "VISUAL_CDN", default_value = "")]
    pub visual_cdn: String,

    /// Shared secret for admin commands; unset disables them
    #[arg(long, env = "ADMIN_KEY")]
    pub admin_key: Option<String>,
}

impl ServerConfig {
    pub fn content_refresh(&self) -> Duration {
        Duration::from_secs(self.content_refresh_secs)
    }
}

#[cfg(test)]
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            content_path: PathBuf::from("content.json"),
            content_refresh_secs: 60,
            visual_cdn: String::new(),
            admin_key: None,
        }
    }
}
