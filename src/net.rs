//! Transport Glue: the listening socket and the origin dial. Thin and
//! replaceable — no cache-aware logic lives here.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{ProxyError, ProxyResult};

pub const BACKLOG: i32 = 10;

/// IPv6 passive socket with `SO_REUSEADDR` set and a backlog of 10.
/// IPv6 dual-stack (mapped IPv4 addresses) is left enabled by not setting
/// `IPV6_V6ONLY`, matching the original `getaddrinfo(AF_INET6, AI_PASSIVE)`
/// behavior on platforms where dual-stack is the default.
pub fn bind_listener(port: u16) -> ProxyResult<TcpListener> {
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    let addr: SocketAddr = format!("[::]:{port}").parse().expect("valid IPv6 listen address");
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener).map_err(ProxyError::from)
}

/// Strips enclosing `[ ]` from an IPv6 literal Host value, leaving other
/// values untouched.
fn strip_ipv6_brackets(host: &str) -> &str {
    host.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(host)
}

/// Resolves the Host header value and connects to origin port 80, trying
/// every resolved address in order until one succeeds.
pub async fn connect_to_origin(host: &str) -> ProxyResult<TcpStream> {
    let real_host = strip_ipv6_brackets(host);
    let target = format!("{real_host}:80");

    let addrs = tokio::net::lookup_host(&target)
        .await
        .map_err(|_| ProxyError::OriginUnreachable(host.to_string()))?;

    for addr in addrs {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return Ok(stream);
        }
    }
    Err(ProxyError::OriginUnreachable(host.to_string()))
}
