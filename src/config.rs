use clap::Parser;

/// `proxy -p <listen-port> [-c]`
///
/// Missing `-p` is a usage error: clap prints usage to stderr and exits
/// with a nonzero code on its own, without any
/// extra handling here.
#[derive(Debug, Parser)]
#[command(name = "proxy", about = "Forwarding HTTP/1.x proxy with an optional in-memory cache")]
pub struct Config {
    /// TCP port to listen on (IPv6 passive socket; mapped IPv4 permitted).
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub listen_port: u16,

    /// Enable the in-memory response cache.
    #[arg(short = 'c', long = "cache")]
    pub caching_enabled: bool,
}

impl Config {
    pub fn parse_args() -> Self {
        Config::parse()
    }
}
