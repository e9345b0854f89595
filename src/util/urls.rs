use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

/// Rejection reasons for remote URLs taken from feed data.
#[derive(Error, Debug)]
pub enum UrlError {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme: {0}")]
    Scheme(String),
    #[error("address not routable from here: {0}")]
    PrivateAddress(String),
}

/// Validates a URL before the client will touch it.
///
/// Cover and detail URLs arrive inside feed responses, so they are as
/// untrusted as the titles. Only http/https are accepted, and hosts that
/// resolve syntactically to loopback, link-local, or private ranges are
/// refused so a hostile feed cannot point probes at the local network.
pub fn validate_remote_url(raw: &str) -> Result<Url, UrlError> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::Scheme(other.to_owned())),
    }

    match url.host() {
        Some(Host::Domain(d)) if d.eq_ignore_ascii_case("localhost") => {
            Err(UrlError::PrivateAddress(d.to_owned()))
        }
        Some(Host::Ipv4(ip)) if !is_public_v4(ip) => Err(UrlError::PrivateAddress(ip.to_string())),
        Some(Host::Ipv6(ip)) if !is_public_v6(ip) => Err(UrlError::PrivateAddress(ip.to_string())),
        _ => Ok(url),
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    !(ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified())
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return false;
    }
    let head = ip.segments()[0];
    // fc00::/7 unique local, fe80::/10 link local
    let unique_local = head & 0xfe00 == 0xfc00;
    let link_local = head & 0xffc0 == 0xfe80;
    !(unique_local || link_local)
}
