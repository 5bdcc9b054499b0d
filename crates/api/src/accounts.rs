//! In-memory account directory backing sign-in and registration.
//! Seeded with one admin account; nothing is persisted.

use roster_core::{RosterError, RosterResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

pub const DEFAULT_AVATAR: &str = "/images/avatar-placeholder.png";
pub const CREDENTIALS_PROVIDER: &str = "credentials";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub image: String,
    /// Provider the account signed up or last linked with; `None` for legacy rows.
    pub provider: Option<String>,
    #[serde(skip)]
    password_digest: Option<String>,
}

/// Opaque identity handed to the dashboard; only `authenticated` gates anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub authenticated: bool,
    pub display_name: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self { Self::default() }

    pub fn for_account(acct: &Account) -> Self {
        Self {
            authenticated: true,
            display_name: Some(acct.name.clone()),
            user_id: Some(acct.id.clone()),
            role: Some(acct.role.clone()),
        }
    }
}

/// Profile fields an OAuth provider hands back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthProfile {
    pub email: String,
    pub name: Option<String>,
    pub login: Option<String>,
    pub image: Option<String>,
    pub avatar_url: Option<String>,
}

fn digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[derive(Debug, Default)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl AccountDirectory {
    pub fn new() -> Self { Self::default() }

    /// Directory holding the demo admin (`admin@example.com` / `password123`).
    pub fn with_demo_admin() -> Self {
        let mut dir = Self::new();
        dir.accounts.push(Account {
            id: "1".into(),
            name: "Admin User".into(),
            email: "admin@example.com".into(),
            role: "admin".into(),
            image: DEFAULT_AVATAR.into(),
            provider: Some(CREDENTIALS_PROVIDER.into()),
            password_digest: Some(digest("password123")),
        });
        dir
    }

    pub fn len(&self) -> usize { self.accounts.len() }
    pub fn is_empty(&self) -> bool { self.accounts.is_empty() }
    pub fn accounts(&self) -> &[Account] { &self.accounts }

    fn next_id(&self) -> String { (self.accounts.len() + 1).to_string() }

    pub fn register(&mut self, name: &str, email: &str, password: &str) -> RosterResult<Account> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(RosterError::InvalidArgument("missing required fields".into()));
        }
        if self.accounts.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            warn!(email, "accounts: duplicate registration");
            return Err(RosterError::Conflict(format!("user with email {} already exists", email)));
        }
        let acct = Account {
            id: self.next_id(),
            name: name.to_string(),
            email: email.to_string(),
            role: "user".into(),
            image: DEFAULT_AVATAR.into(),
            provider: Some(CREDENTIALS_PROVIDER.into()),
            password_digest: Some(digest(password)),
        };
        info!(id = %acct.id, email = %acct.email, "accounts: registered");
        self.accounts.push(acct.clone());
        Ok(acct)
    }

    /// Credentials check. Any mismatch yields an anonymous session.
    pub fn sign_in(&self, email: &str, password: &str) -> Session {
        let want = digest(password);
        match self.accounts.iter().find(|a| a.email.eq_ignore_ascii_case(email.trim())) {
            Some(acct) if acct.password_digest.as_deref() == Some(want.as_str()) => {
                info!(id = %acct.id, "accounts: signed in");
                Session::for_account(acct)
            }
            _ => {
                warn!(email, "accounts: sign-in rejected");
                Session::anonymous()
            }
        }
    }

    /// Match by email with the same provider (or a provider-less row); otherwise create.
    pub fn find_or_create_oauth(&mut self, profile: &OAuthProfile, provider: &str) -> RosterResult<Account> {
        if profile.email.trim().is_empty() {
            return Err(RosterError::InvalidArgument("oauth profile has no email".into()));
        }
        let found = self.accounts.iter_mut().find(|a| {
            a.email.eq_ignore_ascii_case(&profile.email) && a.provider.as_deref().map(|p| p == provider).unwrap_or(true)
        });
        if let Some(acct) = found {
            if acct.provider.is_none() {
                acct.provider = Some(provider.to_string());
                info!(id = %acct.id, provider, "accounts: provider linked");
            }
            return Ok(acct.clone());
        }
        let name = profile
            .name
            .clone()
            .or_else(|| profile.login.clone())
            .unwrap_or_else(|| profile.email.clone());
        let image = profile
            .image
            .clone()
            .or_else(|| profile.avatar_url.clone())
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string());
        let acct = Account {
            id: self.next_id(),
            name,
            email: profile.email.clone(),
            role: "user".into(),
            image,
            provider: Some(provider.to_string()),
            password_digest: None,
        };
        info!(id = %acct.id, provider, "accounts: created from oauth");
        self.accounts.push(acct.clone());
        Ok(acct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_admin_signs_in() {
        let dir = AccountDirectory::with_demo_admin();
        let s = dir.sign_in("admin@example.com", "password123");
        assert!(s.authenticated);
        assert_eq!(s.display_name.as_deref(), Some("Admin User"));
        assert_eq!(s.role.as_deref(), Some("admin"));
        assert!(!dir.sign_in("admin@example.com", "nope").authenticated);
        assert!(!dir.sign_in("ghost@example.com", "password123").authenticated);
    }

    #[test]
    fn register_validates_and_rejects_duplicates() {
        let mut dir = AccountDirectory::with_demo_admin();
        assert!(matches!(dir.register("", "a@b.c", "pw"), Err(RosterError::InvalidArgument(_))));
        assert!(matches!(dir.register("Admin Two", "ADMIN@example.com", "pw"), Err(RosterError::Conflict(_))));
        let acct = dir.register("Grace", "grace@example.com", "hopper").unwrap();
        assert_eq!(acct.id, "2");
        assert_eq!(acct.role, "user");
        assert!(dir.sign_in("grace@example.com", "hopper").authenticated);
    }

    #[test]
    fn password_digest_never_serialized() {
        let dir = AccountDirectory::with_demo_admin();
        let json = serde_json::to_string(&dir.accounts()[0]).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains(&digest("password123")));
    }

    #[test]
    fn oauth_find_or_create_is_idempotent_and_links_provider() {
        let mut dir = AccountDirectory::with_demo_admin();
        let profile = OAuthProfile { email: "octo@example.com".into(), login: Some("octocat".into()), ..Default::default() };
        let a = dir.find_or_create_oauth(&profile, "github").unwrap();
        let b = dir.find_or_create_oauth(&profile, "github").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "octocat");
        assert_eq!(a.image, DEFAULT_AVATAR);
        assert_eq!(dir.len(), 2);

        // Same email, different provider: a separate account.
        let c = dir.find_or_create_oauth(&profile, "google").unwrap();
        assert_ne!(a.id, c.id);

        // Provider-less rows adopt the provider.
        dir.accounts.push(Account {
            id: "9".into(),
            name: "Legacy".into(),
            email: "legacy@example.com".into(),
            role: "user".into(),
            image: DEFAULT_AVATAR.into(),
            provider: None,
            password_digest: None,
        });
        let legacy = OAuthProfile { email: "legacy@example.com".into(), ..Default::default() };
        let linked = dir.find_or_create_oauth(&legacy, "github").unwrap();
        assert_eq!(linked.id, "9");
        assert_eq!(linked.provider.as_deref(), Some("github"));
    }
}
