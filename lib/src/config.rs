//! Session configuration. The library performs no file I/O; embedding
//! processes deserialize this from whatever config source they use and
//! hand it to [`ProxySession::new`](crate::session::ProxySession::new).

use std::collections::HashSet;

use serde::Deserialize;

/// `X-Forwarded-For` rewrite rule. `truncate` keeps only that many trailing
/// entries (negative means unlimited); `append` adds the downstream peer
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct XffRule {
    pub truncate: i32,
    pub append: bool,
}

impl Default for XffRule {
    fn default() -> Self {
        Self {
            truncate: -1,
            append: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Issuer for outbound `Grip-Sig` tokens when the route carries no
    /// signing material of its own.
    pub default_sig_iss: String,
    /// Key for outbound `Grip-Sig` tokens; empty disables default signing.
    pub default_sig_key: String,
    /// Key for validating inbound `Grip-Sig`; empty disables the check.
    pub default_upstream_key: String,
    /// Emit `X-Forwarded-Protocol: https` for TLS downstreams.
    pub use_x_forwarded_protocol: bool,
    /// XFF rule applied when the inbound hop is not trusted.
    pub xff_rule: XffRule,
    /// XFF rule applied when the inbound hop carried a valid `Grip-Sig`.
    pub xff_trusted_rule: XffRule,
    /// Response content-types that divert the session into the handoff
    /// path instead of streaming to clients.
    pub accept_types: HashSet<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut accept_types = HashSet::new();
        accept_types.insert("application/grip-instruct".to_string());

        Self {
            default_sig_iss: String::new(),
            default_sig_key: String::new(),
            default_upstream_key: String::new(),
            use_x_forwarded_protocol: false,
            xff_rule: XffRule::default(),
            xff_trusted_rule: XffRule::default(),
            accept_types,
        }
    }
}
