use std::fmt;

/// Error taxonomy for one connection's lifetime.
///
/// Never surfaces to the client as an HTTP status: the proxy either forwards
/// the origin's own response or tears the connection down silently.
#[derive(Debug)]
pub enum ProxyError {
    /// Request or response bytes did not parse (no CRLFCRLF, missing Host,
    /// malformed request-line).
    Malformed(&'static str),
    /// A `recv`/`send`/`connect` call failed.
    Io(std::io::Error),
    /// Every resolved address for the origin host refused the connection.
    OriginUnreachable(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Malformed(reason) => write!(f, "malformed request: {reason}"),
            ProxyError::Io(e) => write!(f, "transport error: {e}"),
            ProxyError::OriginUnreachable(host) => {
                write!(f, "failed to connect to origin server: {host}")
            }
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(e)
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
