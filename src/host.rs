//! Optional host-integration capability.
//!
//! When the client is launched from an embedding host (a chat app's game
//! launcher, a kiosk wrapper), the host passes a session token and user label
//! through the environment. Components receive this context by injection
//! instead of reading ambient globals.

use std::env;

#[derive(Clone, Debug, Default)]
pub struct HostContext {
    /// True when launched by an embedding host rather than standalone.
    pub embedded: bool,
    /// Display label for the signed-in user, if the host provided one.
    pub user: Option<String>,
    /// Bearer token attached to every API request when present.
    pub session_token: Option<String>,
    /// Host asked for a reduced-color theme.
    pub mono: bool,
}

impl HostContext {
    pub fn detect() -> Self {
        let session_token = env::var("FARMSTEAD_SESSION").ok().filter(|s| !s.is_empty());
        Self {
            embedded: session_token.is_some(),
            user: env::var("FARMSTEAD_USER").ok().filter(|s| !s.is_empty()),
            session_token,
            mono: env::var_os("NO_COLOR").is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_is_standalone() {
        let ctx = HostContext::default();
        assert!(!ctx.embedded);
        assert!(ctx.session_token.is_none());
    }
}
