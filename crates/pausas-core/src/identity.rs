//! Who is using the app, as far as persisted state is concerned.
//!
//! The identity only namespaces storage keys so that two accounts on the same
//! device never read each other's timer.

use std::sync::{Arc, RwLock};

/// Sentinel used in storage keys when nobody is signed in.
pub const ANONYMOUS: &str = "anonymous";

pub trait IdentityProvider {
    fn user_id(&self) -> Option<String>;
}

/// Storage namespace for an optional user id.
pub fn namespace(user_id: Option<&str>) -> &str {
    match user_id {
        Some(id) if !id.is_empty() => id,
        _ => ANONYMOUS,
    }
}

/// A fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }
}

impl IdentityProvider for StaticIdentity {
    fn user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// An identity that changes on login/logout.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedIdentity {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(user_id)),
        }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(user_id.into());
    }

    pub fn sign_out(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl IdentityProvider for SharedIdentity {
    fn user_id(&self) -> Option<String> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_falls_back_to_anonymous() {
        assert_eq!(namespace(None), ANONYMOUS);
        assert_eq!(namespace(Some("")), ANONYMOUS);
        assert_eq!(namespace(Some("u-42")), "u-42");
    }

    #[test]
    fn shared_identity_switches() {
        let identity = SharedIdentity::default();
        assert_eq!(identity.user_id(), None);
        identity.sign_in("ana");
        assert_eq!(identity.user_id().as_deref(), Some("ana"));
        identity.sign_out();
        assert_eq!(identity.user_id(), None);
    }
}
