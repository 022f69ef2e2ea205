//! Browser-origin validation for write requests.

use url::Url;

use crate::error::{AuthError, AuthResult};

/// Hosts of trusted embedding providers, always accepted as origins.
const PROVIDER_HOSTS: &[&str] = &["script.google.com", "script.googleusercontent.com"];

/// Validate the `Origin` header of a POST request.
///
/// A present origin must resolve to localhost, a configured tenant hostname
/// or a well-known provider host. An absent origin is only acceptable when
/// the request carries header credentials (`Authorization` / `X-API-Key`),
/// i.e. it came from an API client rather than a browser.
pub fn check_origin(
    origin: Option<&str>,
    has_header_credentials: bool,
    tenant_hostnames: &[String],
) -> AuthResult<()> {
    let Some(origin) = origin else {
        if has_header_credentials {
            return Ok(());
        }
        return Err(AuthError::OriginRejected(
            "no origin and no header credentials".to_string(),
        ));
    };

    let host = Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_ascii_lowercase()))
        .ok_or_else(|| AuthError::OriginRejected(format!("unparseable origin {origin}")))?;

    if host == "localhost" || host == "127.0.0.1" {
        return Ok(());
    }
    if PROVIDER_HOSTS.contains(&host.as_str()) {
        return Ok(());
    }
    if tenant_hostnames
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(&host))
    {
        return Ok(());
    }
    Err(AuthError::OriginRejected(host))
}
