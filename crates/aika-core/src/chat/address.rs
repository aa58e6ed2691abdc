use std::net::Ipv4Addr;

use crate::session::{DEFAULT_PORT, Endpoint};

const EDGE_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', '(', ')', '"', '\''];

/// Parses a whitespace-delimited token of the form `a.b.c.d[:port]`.
///
/// Surrounding punctuation is ignored. Octets must be 0-255 and the port 1-65535; the
/// default port applies when none is given.
pub fn parse_endpoint(token: &str) -> Option<Endpoint> {
    let token = token.trim_matches(EDGE_PUNCTUATION);
    let (host, port) = match token.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (token, None),
    };

    if host.split('.').count() != 4 || !host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let ip: Ipv4Addr = host.parse().ok()?;

    let port = match port {
        Some(p) => {
            let p: u16 = p.parse().ok()?;
            if p == 0 {
                return None;
            }
            p
        }
        None => DEFAULT_PORT,
    };

    Some(Endpoint::new(ip.to_string(), port))
}
