//! Target URL policy.
//!
//! Runs before rate limiting and again on every redirect hop. Hosts are
//! checked after the URL parser has normalized them, so decimal, octal and
//! hex IPv4 spellings cannot slip past as domain names.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

use crate::GatewayError;

/// Why a target was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRule {
    /// Anything but `http` and `https`, including `file` and `ftp`.
    Scheme,
    MissingHost,
    /// `localhost` and any `*.localhost` name.
    Localhost,
    /// `127.0.0.0/8` and `::1`.
    Loopback,
    /// `10/8`, `172.16/12`, `192.168/16`.
    PrivateNetwork,
    /// `169.254/16` and `fe80::/10`.
    LinkLocal,
    /// `0.0.0.0` and `::`.
    Unspecified,
    /// `fc00::/7`.
    UniqueLocal,
}

impl fmt::Display for BlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Scheme => "scheme is not http or https",
            Self::MissingHost => "URL has no host",
            Self::Localhost => "localhost",
            Self::Loopback => "loopback address",
            Self::PrivateNetwork => "private network address",
            Self::LinkLocal => "link-local address",
            Self::Unspecified => "unspecified address",
            Self::UniqueLocal => "unique-local address",
        };
        f.write_str(text)
    }
}

/// Parses `raw` and applies every block rule.
///
/// # Errors
///
/// [`GatewayError::InvalidUrl`] if `raw` does not parse,
/// [`GatewayError::Blocked`] if a rule matches.
pub fn validate_url(raw: &str) -> Result<Url, GatewayError> {
    let url = Url::parse(raw.trim()).map_err(|_| GatewayError::InvalidUrl)?;
    check_url(&url).map_err(|rule| {
        tracing::warn!(host = url.host_str().unwrap_or(""), rule = %rule, "blocked proxy target");
        GatewayError::Blocked { rule }
    })?;
    Ok(url)
}

/// Applies every block rule to an already parsed URL.
pub fn check_url(url: &Url) -> Result<(), BlockRule> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BlockRule::Scheme);
    }
    match url.host() {
        None => Err(BlockRule::MissingHost),
        Some(Host::Domain(domain)) => check_domain(domain),
        Some(Host::Ipv4(ip)) => check_ipv4(ip),
        Some(Host::Ipv6(ip)) => check_ipv6(ip),
    }
}

fn check_domain(domain: &str) -> Result<(), BlockRule> {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    if domain == "localhost" || domain.ends_with(".localhost") {
        return Err(BlockRule::Localhost);
    }
    Ok(())
}

fn check_ipv4(ip: Ipv4Addr) -> Result<(), BlockRule> {
    if ip.is_loopback() {
        Err(BlockRule::Loopback)
    } else if ip.is_private() {
        Err(BlockRule::PrivateNetwork)
    } else if ip.is_link_local() {
        Err(BlockRule::LinkLocal)
    } else if ip.is_unspecified() {
        Err(BlockRule::Unspecified)
    } else {
        Ok(())
    }
}

fn check_ipv6(ip: Ipv6Addr) -> Result<(), BlockRule> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return check_ipv4(v4);
    }
    let first = ip.segments()[0];
    if ip.is_loopback() {
        Err(BlockRule::Loopback)
    } else if ip.is_unspecified() {
        Err(BlockRule::Unspecified)
    } else if first & 0xfe00 == 0xfc00 {
        Err(BlockRule::UniqueLocal)
    } else if first & 0xffc0 == 0xfe80 {
        Err(BlockRule::LinkLocal)
    } else {
        Ok(())
    }
}
