//! Outbound URL validation with an SSRF denylist. Every URL accepted from a
//! client (shortlink targets, template `url` fields, CTA links) passes through
//! [`is_url`] before it is stored or followed.

use std::net::Ipv4Addr;

use url::{Host, Url};

pub const MAX_URL_LEN: usize = 2048;

/// Scheme substrings rejected anywhere in the raw input, before parsing.
const BANNED_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:", "file:"];

/// Validate a URL for storage and redirect use.
///
/// Accepts only parseable `http`/`https` URLs up to [`MAX_URL_LEN`] bytes
/// whose host is not on the private-network denylist.
pub fn is_url(raw: &str) -> bool {
    if raw.is_empty() || raw.len() > MAX_URL_LEN {
        return false;
    }
    let lower = raw.to_ascii_lowercase();
    if BANNED_SCHEMES.iter().any(|s| lower.contains(s)) {
        return false;
    }
    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return false,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host() {
        Some(host) => !is_denied_host(&host),
        None => false,
    }
}

/// Hosts that resolve into private or link-local address space.
fn is_denied_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(addr) => is_denied_ipv4(*addr),
        Host::Ipv6(addr) => {
            addr.is_loopback() || addr.to_ipv4_mapped().is_some_and(is_denied_ipv4)
        }
    }
}

fn is_denied_ipv4(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    octets[0] == 127
        || octets[0] == 10
        || (octets[0] == 192 && octets[1] == 168)
        || (octets[0] == 172 && (16..=31).contains(&octets[1]))
        || (octets[0] == 169 && octets[1] == 254)
}
