pub mod client;
pub mod envelope;
pub mod models;

use std::future::Future;

use chrono::NaiveDate;

use crate::error::Result;
use models::{
    BookingRequest, Conversation, Identity, Message, OutgoingMessage, Professional, Profile,
    Registration, SessionEntry, Slot, ThreadTarget, UserId,
};

/// Everything the panels ask of the REST backend.
///
/// `ApiClient` is the HTTP implementation; tests substitute a recording fake.
/// Every call names the identity explicitly, no cookie session is assumed.
pub trait Backend {
    /// Conversation summaries visible to `identity`, one row per message or peer.
    fn conversations(&self, identity: &Identity) -> impl Future<Output = Result<Vec<Conversation>>> + Send;

    /// History of one thread, as the backend orders it.
    fn thread(&self, identity: &Identity, target: &ThreadTarget) -> impl Future<Output = Result<Vec<Message>>> + Send;

    fn send_message(&self, message: &OutgoingMessage) -> impl Future<Output = Result<()>> + Send;

    fn professionals(&self) -> impl Future<Output = Result<Vec<Professional>>> + Send;

    fn slots(&self, professional: &UserId, date: NaiveDate) -> impl Future<Output = Result<Vec<Slot>>> + Send;

    fn book(&self, request: &BookingRequest) -> impl Future<Output = Result<()>> + Send;

    fn sessions(&self, identity: &Identity) -> impl Future<Output = Result<Vec<SessionEntry>>> + Send;

    /// The student's or professional's own profile page.
    fn profile(&self, identity: &Identity) -> impl Future<Output = Result<Profile>> + Send;

    /// Starts a login; the returned identity is pending until its OTP is verified.
    fn login(&self, email: &str, password: &str) -> impl Future<Output = Result<Identity>> + Send;

    fn register(&self, registration: &Registration) -> impl Future<Output = Result<Identity>> + Send;

    fn verify_otp(&self, pending: &Identity, code: &str) -> impl Future<Output = Result<()>> + Send;

    /// Full user record after verification, normalized to an identity.
    fn fetch_user(&self, pending: &Identity) -> impl Future<Output = Result<Identity>> + Send;
}
