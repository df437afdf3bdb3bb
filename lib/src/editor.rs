//! Header rewriting for both hops: hop-by-hop stripping, `Grip-Sig`
//! validation/replacement, `X-Forwarded-Protocol` and `X-Forwarded-For`
//! on the way to the origin, and response hygiene on the way back.

use std::net::IpAddr;

use http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING,
    CONTENT_LENGTH, TRANSFER_ENCODING,
};
use log::{debug, warn};

use crate::config::XffRule;
use crate::token;

pub const GRIP_SIG: HeaderName = HeaderName::from_static("grip-sig");
const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTOCOL: HeaderName = HeaderName::from_static("x-forwarded-protocol");

/// Removes the hop-by-hop headers that only apply to the downstream hop.
/// They must never reach the origin.
pub fn strip_request_headers(headers: &mut HeaderMap) {
    headers.remove(CONNECTION);
    headers.remove(KEEP_ALIVE);
    headers.remove(ACCEPT_ENCODING);
    headers.remove(CONTENT_ENCODING);
    headers.remove(TRANSFER_ENCODING);
}

/// Removes the hop-by-hop headers that only apply to the origin hop, and
/// defaults the response to chunked delivery when no framing is left.
pub fn strip_response_headers(headers: &mut HeaderMap) {
    headers.remove(CONNECTION);
    headers.remove(KEEP_ALIVE);
    headers.remove(CONTENT_ENCODING);
    headers.remove(TRANSFER_ENCODING);

    if !headers.contains_key(CONTENT_LENGTH) && !headers.contains_key(TRANSFER_ENCODING) {
        headers.append(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    }
}

/// Outbound-request rewrite: trust decision, signing, forwarding headers.
pub struct RequestRewriter<'a> {
    /// Issuer and key for the outbound `Grip-Sig`; the route's material
    /// when present, otherwise the configured default.
    pub sig: Option<(&'a str, &'a [u8])>,
    /// Key validating an inbound `Grip-Sig`; empty disables the check.
    pub upstream_key: &'a [u8],
    pub use_x_forwarded_protocol: bool,
    pub xff_rule: &'a XffRule,
    pub xff_trusted_rule: &'a XffRule,
}

impl RequestRewriter<'_> {
    /// Applies the rewrite in place. Returns true when the request already
    /// carried a valid upstream signature, in which case the header is left
    /// intact and the trusted XFF rule is used.
    pub fn apply(&self, headers: &mut HeaderMap, is_https: bool, peer: Option<IpAddr>) -> bool {
        let mut pass_to_upstream = false;

        if !self.upstream_key.is_empty() {
            if let Some(value) = headers.get(&GRIP_SIG) {
                if token::validate_token(value.as_bytes(), self.upstream_key) {
                    debug!("passing to upstream");
                    pass_to_upstream = true;
                } else {
                    debug!(
                        "signature present but invalid: {}",
                        String::from_utf8_lossy(value.as_bytes())
                    );
                }
            }
        }

        if !pass_to_upstream {
            headers.remove(&GRIP_SIG);
            if let Some((iss, key)) = self.sig {
                match token::make_token(iss, key) {
                    Ok(token) => {
                        if let Ok(value) = HeaderValue::from_str(&token) {
                            headers.append(&GRIP_SIG, value);
                        }
                    }
                    Err(e) => warn!("failed to sign request: {e}"),
                }
            }
        }

        if self.use_x_forwarded_protocol {
            headers.remove(&X_FORWARDED_PROTOCOL);
            if is_https {
                headers.append(&X_FORWARDED_PROTOCOL, HeaderValue::from_static("https"));
            }
        }

        let rule = if pass_to_upstream {
            self.xff_trusted_rule
        } else {
            self.xff_rule
        };
        apply_xff(headers, rule, peer);

        pass_to_upstream
    }
}

fn apply_xff(headers: &mut HeaderMap, rule: &XffRule, peer: Option<IpAddr>) {
    let mut values: Vec<String> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect();
    headers.remove(&X_FORWARDED_FOR);

    if rule.truncate >= 0 {
        let keep = rule.truncate as usize;
        if values.len() > keep {
            values.drain(..values.len() - keep);
        }
    }

    if rule.append {
        if let Some(peer) = peer {
            values.push(peer.to_string());
        }
    }

    if !values.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&values.join(", ")) {
            headers.append(&X_FORWARDED_FOR, value);
        }
    }
}
