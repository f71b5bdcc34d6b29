//! Signed-in identity and the login → OTP → logout lifecycle.
//!
//! Pending-verification markers are written when a login or registration is
//! accepted and consumed when its OTP is verified. Student and professional
//! identities are durable; an administrator's identity only lives in the
//! ephemeral store and is gone when the process ends.

use log::{info, warn};

use crate::api::Backend;
use crate::api::models::{Identity, Registration, Role, UserId};
use crate::error::{ClientError, Result, ValidationError};
use crate::storage::KvStore;

const USER_KEY: &str = "user";
const PENDING_ID_KEY: &str = "pending_user_id";
const PENDING_TYPE_KEY: &str = "pending_user_type";

pub const OTP_LEN: usize = 6;
const MIN_PASSWORD_LEN: usize = 8;

pub struct SessionState<D, E> {
    durable: D,
    ephemeral: E,
}

impl<D: KvStore, E: KvStore> SessionState<D, E> {
    pub fn new(durable: D, ephemeral: E) -> Self {
        Self { durable, ephemeral }
    }

    pub fn identity(&self) -> Result<Option<Identity>> {
        let raw = match self.ephemeral.get(USER_KEY)? {
            Some(raw) => Some(raw),
            None => self.durable.get(USER_KEY)?,
        };
        let Some(raw) = raw else { return Ok(None) };
        match serde_json::from_str::<Identity>(&raw) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                warn!("discarding unreadable stored identity: {e}");
                Ok(None)
            }
        }
    }

    /// The identity a protected page runs as. `NotSignedIn` means "go to login".
    pub fn require_identity(&self) -> Result<Identity> {
        self.identity()?.ok_or(ClientError::NotSignedIn)
    }

    pub fn pending(&self) -> Result<Option<Identity>> {
        let id = self.durable.get(PENDING_ID_KEY)?;
        let role = self.durable.get(PENDING_TYPE_KEY)?;
        Ok(match (id, role) {
            (Some(id), Some(role)) => role
                .parse::<Role>()
                .ok()
                .map(|role| Identity { id: UserId::from(id.as_str()), role }),
            _ => None,
        })
    }

    pub fn record_pending(&mut self, pending: &Identity) -> Result<()> {
        self.durable.set(PENDING_ID_KEY, pending.id.as_str())?;
        self.durable.set(PENDING_TYPE_KEY, pending.role.as_str())
    }

    /// Stores the verified identity and consumes the pending markers.
    pub fn complete_verification(&mut self, identity: &Identity) -> Result<()> {
        let json = serde_json::to_string(identity).map_err(|e| ClientError::Storage(e.to_string()))?;
        match identity.role {
            Role::Admin => self.ephemeral.set(USER_KEY, &json)?,
            Role::Student | Role::Professional => self.durable.set(USER_KEY, &json)?,
        }
        self.durable.remove(PENDING_ID_KEY)?;
        self.durable.remove(PENDING_TYPE_KEY)?;
        info!("signed in as {} {}", identity.role, identity.id);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        self.durable.remove(USER_KEY)?;
        self.ephemeral.clear()
    }

    pub async fn login<B: Backend>(&mut self, backend: &B, email: &str, password: &str) -> Result<Identity> {
        let (email, password) = validate_credentials(email, password)?;
        let pending = backend.login(email, password).await?;
        self.record_pending(&pending)?;
        Ok(pending)
    }

    pub async fn register<B: Backend>(&mut self, backend: &B, registration: &Registration) -> Result<Identity> {
        validate_registration(registration)?;
        let pending = backend.register(registration).await?;
        self.record_pending(&pending)?;
        Ok(pending)
    }

    /// On rejection the pending markers stay, so the user can retry the code.
    pub async fn verify_otp<B: Backend>(&mut self, backend: &B, code: &str) -> Result<Identity> {
        let code = validate_otp(code)?;
        let pending = self.pending()?.ok_or(ClientError::NotSignedIn)?;
        let identity = confirm_otp(backend, &pending, &code).await?;
        self.complete_verification(&identity)?;
        Ok(identity)
    }
}

/// Verifies `code` for `pending` and looks up the full user record.
pub async fn confirm_otp<B: Backend>(backend: &B, pending: &Identity, code: &str) -> Result<Identity> {
    backend.verify_otp(pending, code).await?;
    backend.fetch_user(pending).await
}

pub fn validate_credentials<'a>(email: &'a str, password: &'a str) -> std::result::Result<(&'a str, &'a str), ValidationError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    Ok((email, password))
}

/// Exactly six ASCII digits; surrounding whitespace is ignored.
pub fn validate_otp(code: &str) -> std::result::Result<String, ValidationError> {
    let code = code.trim();
    let got = code.chars().count();
    if got != OTP_LEN {
        return Err(ValidationError::OtpLength { got });
    }
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::OtpNonDigit);
    }
    Ok(code.to_string())
}

/// The backend's password rules, checked before the form is sent.
pub fn validate_password(password: &str) -> std::result::Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::WeakPassword("Password must be at least 8 characters long"));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(ValidationError::WeakPassword("Password must contain at least one uppercase letter"));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(ValidationError::WeakPassword("Password must contain at least one lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::WeakPassword("Password must contain at least one number"));
    }
    if password.chars().all(|c| c.is_alphanumeric()) {
        return Err(ValidationError::WeakPassword("Password must contain at least one special character"));
    }
    Ok(())
}

pub fn validate_registration(registration: &Registration) -> std::result::Result<(), ValidationError> {
    if registration.full_name.trim().is_empty() {
        return Err(ValidationError::MissingField("full name"));
    }
    if registration.email.trim().is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    if registration.role == Role::Admin {
        return Err(ValidationError::AdminRegistration);
    }
    validate_password(&registration.password)
}

/// Where a freshly verified user lands.
pub fn landing_page(role: Role) -> &'static str {
    match role {
        Role::Student => "student/home",
        Role::Professional => "professional/home",
        Role::Admin => "admin/users",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SqliteStore};
    use crate::testing::FakeBackend;

    fn state() -> SessionState<SqliteStore, MemoryStore> {
        SessionState::new(SqliteStore::in_memory().unwrap(), MemoryStore::new())
    }

    #[test]
    fn missing_identity_means_redirect() {
        assert_eq!(state().require_identity().unwrap_err(), ClientError::NotSignedIn);
    }

    #[test]
    fn otp_shape_is_checked_locally() {
        assert_eq!(validate_otp("12345"), Err(ValidationError::OtpLength { got: 5 }));
        assert_eq!(validate_otp("12a456"), Err(ValidationError::OtpNonDigit));
        assert_eq!(validate_otp(" 123456 ").as_deref(), Ok("123456"));
    }

    #[test]
    fn password_rules_match_backend() {
        assert!(validate_password("Short1!").is_err());
        assert!(validate_password("alllower1!").is_err());
        assert!(validate_password("NoDigits!!").is_err());
        assert!(validate_password("NoSpecial1").is_err());
        assert!(validate_password("Good#Pass1").is_ok());
    }

    #[tokio::test]
    async fn full_login_flow() {
        let backend = FakeBackend::new();
        backend.set_login(Ok(Identity::new("7", Role::Student)));
        backend.set_user(Ok(Identity::new("7", Role::Student)));
        let mut session = state();

        let pending = session.login(&backend, " jo@example.com ", "pw").await.unwrap();
        assert_eq!(session.pending().unwrap(), Some(pending.clone()));
        assert_eq!(session.identity().unwrap(), None);

        let identity = session.verify_otp(&backend, "123456").await.unwrap();
        assert_eq!(session.require_identity().unwrap(), identity);
        assert_eq!(session.pending().unwrap(), None);
        assert_eq!(landing_page(identity.role), "student/home");

        session.logout().unwrap();
        assert_eq!(session.identity().unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_otp_never_reaches_backend() {
        let backend = FakeBackend::new();
        let mut session = state();
        session.record_pending(&Identity::new("7", Role::Student)).unwrap();
        let err = session.verify_otp(&backend, "12").await.unwrap_err();
        assert_eq!(err, ClientError::Validation(ValidationError::OtpLength { got: 2 }));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn verification_without_pending_markers_is_expired() {
        let backend = FakeBackend::new();
        let mut session = state();
        let err = session.verify_otp(&backend, "123456").await.unwrap_err();
        assert_eq!(err, ClientError::NotSignedIn);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_code_keeps_pending_markers() {
        let backend = FakeBackend::new();
        backend.set_verify(Err(ClientError::Backend { status: 400, message: "Invalid OTP".into() }));
        let mut session = state();
        session.record_pending(&Identity::new("7", Role::Professional)).unwrap();
        assert!(session.verify_otp(&backend, "000000").await.is_err());
        assert!(session.pending().unwrap().is_some());
    }

    #[tokio::test]
    async fn admin_identity_is_not_durable() {
        let backend = FakeBackend::new();
        backend.set_user(Ok(Identity::new("1", Role::Admin)));
        let mut session = state();
        session.record_pending(&Identity::new("1", Role::Admin)).unwrap();
        session.verify_otp(&backend, "123456").await.unwrap();
        assert_eq!(session.identity().unwrap().map(|i| i.role), Some(Role::Admin));
        assert_eq!(session.durable.get(USER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn weak_registration_is_rejected_before_sending() {
        let backend = FakeBackend::new();
        let mut session = state();
        let form = Registration {
            full_name: "Jo".into(),
            email: "jo@example.com".into(),
            password: "password".into(),
            role: Role::Student,
        };
        assert!(session.register(&backend, &form).await.is_err());
        assert!(backend.calls().is_empty());
    }
}
