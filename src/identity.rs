use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{AdmitError, AdmitResult};
use crate::models::{AuthProvider, Identity};
use crate::store::{LocalStore, KEY_USER};

// --- Provider trait ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn auth_provider(&self) -> AuthProvider {
        match self {
            OAuthProvider::Google => AuthProvider::Google,
            OAuthProvider::Github => AuthProvider::Github,
        }
    }
}

pub fn resolve_oauth(name: &str) -> Result<OAuthProvider> {
    match name.trim().to_lowercase().as_str() {
        "google" => Ok(OAuthProvider::Google),
        "github" | "gh" => Ok(OAuthProvider::Github),
        _ => Err(anyhow!(
            "Unknown sign-in provider '{}'. Available: google, github",
            name
        )),
    }
}

/// External authentication service. Every call either yields an identity or
/// a failure; nothing is persisted at this layer.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity>;
    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<Identity>;
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<Identity>;
    async fn sign_out(&self) -> Result<()>;
}

// --- Simulated provider ---

pub const DEFAULT_AUTH_LATENCY: Duration = Duration::from_millis(1500);

/// Stand-in for a hosted auth service: waits out a fixed round trip, then
/// hands back canned identities.
pub struct MockIdentityProvider {
    latency: Duration,
    fail: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            fail: AtomicBool::new(false),
        }
    }

    /// Make subsequent calls fail, as if the service were unreachable.
    #[allow(dead_code)]
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    async fn round_trip(&self) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("identity service unavailable"));
        }
        Ok(())
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_LATENCY)
    }
}

fn require_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(anyhow!("email is required"));
    }
    if password.is_empty() {
        return Err(anyhow!("password is required"));
    }
    Ok(())
}

fn blank_identity(id: String, name: &str, email: &str, provider: AuthProvider) -> Identity {
    Identity {
        id,
        display_name: name.to_string(),
        email: email.trim().to_string(),
        auth_provider: provider,
        university: None,
        address: None,
        profile_image: None,
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        require_credentials(email, password)?;
        self.round_trip().await?;
        Ok(blank_identity(
            "1".to_string(),
            "John Doe",
            email,
            AuthProvider::Password,
        ))
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<Identity> {
        self.round_trip().await?;
        let (prefix, name, email) = match provider {
            OAuthProvider::Google => ("google", "Google User", "user@gmail.com"),
            OAuthProvider::Github => ("github", "GitHub User", "user@github.com"),
        };
        Ok(blank_identity(
            format!("{}_{}", prefix, Utc::now().timestamp_millis()),
            name,
            email,
            provider.auth_provider(),
        ))
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> Result<Identity> {
        if name.trim().is_empty() {
            return Err(anyhow!("name is required"));
        }
        require_credentials(email, password)?;
        self.round_trip().await?;
        Ok(blank_identity(
            Utc::now().timestamp_millis().to_string(),
            name.trim(),
            email,
            AuthProvider::Password,
        ))
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }
}

// --- Session ---

/// Partial profile edit; `None` leaves a field as it is.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub university: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
}

/// The signed-in actor, mirrored into the store under `user` so it survives
/// restarts. Changes are broadcast to anyone holding a [`Session::subscribe`]
/// receiver.
pub struct Session {
    provider: Box<dyn IdentityProvider>,
    store: LocalStore,
    current: Mutex<Option<Identity>>,
    changes: watch::Sender<Option<Identity>>,
}

impl Session {
    pub async fn restore(provider: Box<dyn IdentityProvider>, store: LocalStore) -> Self {
        let saved: Option<Identity> = store.read_value(KEY_USER).await;
        if let Some(identity) = &saved {
            info!(user = %identity.id, "restored session");
        }
        let (changes, _) = watch::channel(saved.clone());
        Self {
            provider,
            store,
            current: Mutex::new(saved),
            changes,
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.lock().clone()
    }

    pub fn require(&self) -> AdmitResult<Identity> {
        self.current().ok_or(AdmitError::NotSignedIn)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.changes.subscribe()
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> AdmitResult<Identity> {
        let result = self.provider.sign_in_with_password(email, password).await;
        self.establish(result).await
    }

    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AdmitResult<Identity> {
        let result = self.provider.sign_in_with_oauth(provider).await;
        self.establish(result).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> AdmitResult<Identity> {
        let result = self.provider.register(name, email, password).await;
        self.establish(result).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        if let Err(e) = self.provider.sign_out().await {
            warn!(error = %e, "provider sign-out failed, clearing local session anyway");
        }
        self.store.remove(KEY_USER).await?;
        self.publish(None);
        info!("signed out");
        Ok(())
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> AdmitResult<Identity> {
        let mut identity = self.require()?;

        if let Some(name) = update.display_name {
            identity.display_name = name;
        }
        if let Some(email) = update.email {
            identity.email = email;
        }
        if let Some(university) = update.university {
            identity.university = Some(university);
        }
        if let Some(address) = update.address {
            identity.address = Some(address);
        }
        if let Some(image) = update.profile_image {
            identity.profile_image = Some(image);
        }

        self.store
            .write_value(KEY_USER, &identity)
            .await
            .map_err(AdmitError::Submission)?;
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn establish(&self, result: Result<Identity>) -> AdmitResult<Identity> {
        let identity = result.map_err(|e| {
            warn!(error = %e, "sign-in failed");
            AdmitError::Authentication(e.to_string())
        })?;

        self.store
            .write_value(KEY_USER, &identity)
            .await
            .map_err(AdmitError::Submission)?;
        self.publish(Some(identity.clone()));
        info!(user = %identity.id, provider = %identity.auth_provider, "signed in");
        Ok(identity)
    }

    fn publish(&self, identity: Option<Identity>) {
        *self.lock() = identity.clone();
        self.changes.send_replace(identity);
    }

    fn lock(&self) -> MutexGuard<'_, Option<Identity>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
