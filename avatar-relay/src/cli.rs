use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Relays JSON lines from stdin to WebSocket clients and serves the avatar page.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address to listen on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// HTML file served at `/`. Defaults to the page bundled into the binary.
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Stop serving once standard input is closed.
    #[arg(long)]
    pub exit_on_eof: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_avatar_page_setup() {
        let cli = Cli::try_parse_from(["avatar-relay"]).expect("parse defaults");
        assert_eq!(cli.listen, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cli.index, None);
        assert!(!cli.exit_on_eof);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "avatar-relay",
            "--listen",
            "127.0.0.1:0",
            "--index",
            "/srv/avatar/index.html",
            "--exit-on-eof",
        ])
        .expect("parse flags");
        assert_eq!(cli.listen.port(), 0);
        assert_eq!(cli.index, Some(PathBuf::from("/srv/avatar/index.html")));
        assert!(cli.exit_on_eof);
    }

    #[test]
    fn rejects_invalid_listen_address() {
        assert!(Cli::try_parse_from(["avatar-relay", "--listen", "localhost"]).is_err());
    }
}
