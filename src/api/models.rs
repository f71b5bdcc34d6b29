use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::format::{self, DisplayRecord};

/// Backend ids arrive as JSON numbers from some routes and strings from others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct UserId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for UserId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => UserId(n.to_string()),
            RawId::Text(s) => UserId(s.trim().to_string()),
        }
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.trim().to_string())
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId(n.to_string())
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Professional,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professional => "professional",
            Role::Admin => "admin",
        }
    }

    /// The capitalised form the backend uses in `Sender` columns.
    pub fn label(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Professional => "Professional",
            Role::Admin => "Admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "professional" => Ok(Role::Professional),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in user, as persisted after OTP verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Peer,
    Admin,
}

/// The other participant of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerRef {
    pub id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadTarget {
    pub channel: Channel,
    pub peer: PeerRef,
}

impl ThreadTarget {
    pub fn peer(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            channel: Channel::Peer,
            peer: PeerRef { id: id.into(), role },
        }
    }

    /// The fixed conversation a student or professional has with the administrator.
    pub fn admin(admin_username: &str) -> Self {
        Self {
            channel: Channel::Admin,
            peer: PeerRef {
                id: UserId::from(admin_username),
                role: Role::Admin,
            },
        }
    }

    /// An administrator's side of the admin channel with one user.
    pub fn admin_with(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            channel: Channel::Admin,
            peer: PeerRef { id: id.into(), role },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub peer: PeerRef,
    pub peer_name: String,
    pub channel: Channel,
    pub last_message_time: Option<NaiveDateTime>,
}

impl Conversation {
    pub fn target(&self) -> ThreadTarget {
        ThreadTarget {
            channel: self.channel,
            peer: self.peer.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender_role: Role,
    pub text: String,
    pub sent_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: Identity,
    pub to: ThreadTarget,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Professional {
    pub id: UserId,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: String,
    #[serde(default)]
    pub booked: bool,
}

impl Slot {
    pub fn available(time: &str) -> Self {
        Self { time: time.to_string(), booked: false }
    }

    pub fn taken(time: &str) -> Self {
        Self { time: time.to_string(), booked: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRequest {
    pub student_id: UserId,
    pub professional_id: UserId,
    #[serde(serialize_with = "serialize_iso_date")]
    pub date: NaiveDate,
    pub time: String,
}

fn serialize_iso_date<S: serde::Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format::iso_date(*date))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub name: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "user_type")]
    pub role: Role,
}

/// One row of any message-shaped backend response.
///
/// The conversation summaries, the flat admin inbox and thread histories all
/// reuse the same column names, so a single all-optional record covers them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireRow {
    #[serde(rename = "StudentID", default)]
    pub student_id: Option<UserId>,
    #[serde(rename = "ProfessionalID", default)]
    pub professional_id: Option<UserId>,
    #[serde(rename = "FullName", default)]
    pub full_name: Option<String>,
    #[serde(rename = "StudentName", default)]
    pub student_name: Option<String>,
    #[serde(rename = "ProfessionalName", default)]
    pub professional_name: Option<String>,
    #[serde(rename = "MessageText", default)]
    pub message_text: Option<String>,
    #[serde(rename = "SentAt", default)]
    pub sent_at: Option<String>,
    #[serde(rename = "Sender", default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<String>,
}

impl WireRow {
    /// Turns a row into a conversation entry as seen by `viewer`.
    ///
    /// Students see professionals, professionals see students, and the
    /// administrator sees both on the admin channel.
    pub fn into_conversation(self, viewer: Role) -> Option<Conversation> {
        let last_message_time = self
            .last_message_time
            .as_deref()
            .or(self.sent_at.as_deref())
            .and_then(format::parse_timestamp);

        let (peer, channel) = match viewer {
            Role::Student => (
                PeerRef { id: self.professional_id.clone()?, role: Role::Professional },
                Channel::Peer,
            ),
            Role::Professional => (
                PeerRef { id: self.student_id.clone()?, role: Role::Student },
                Channel::Peer,
            ),
            Role::Admin => {
                let peer = if let Some(id) = self.student_id.clone() {
                    PeerRef { id, role: Role::Student }
                } else {
                    PeerRef { id: self.professional_id.clone()?, role: Role::Professional }
                };
                (peer, Channel::Admin)
            }
        };

        let named = NamedPeer { row: &self, peer: &peer };
        let peer_name = format::derive_display_name(&named);
        Some(Conversation { peer, peer_name, channel, last_message_time })
    }

    pub fn into_message(self) -> Option<Message> {
        let sender_role = self.sender.as_deref()?.parse::<Role>().ok()?;
        Some(Message {
            sender_role,
            text: self.message_text.unwrap_or_default(),
            sent_at: self.sent_at.as_deref().and_then(format::parse_timestamp),
        })
    }
}

struct NamedPeer<'a> {
    row: &'a WireRow,
    peer: &'a PeerRef,
}

impl DisplayRecord for NamedPeer<'_> {
    fn explicit_name(&self) -> Option<&str> {
        let specific = match self.peer.role {
            Role::Student => self.row.student_name.as_deref(),
            Role::Professional => self.row.professional_name.as_deref(),
            Role::Admin => None,
        };
        specific.or(self.row.full_name.as_deref())
    }

    fn role(&self) -> Option<Role> {
        Some(self.peer.role)
    }

    fn record_id(&self) -> Option<&UserId> {
        Some(&self.peer.id)
    }
}

/// Thread histories come back either bare or wrapped with a summary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ThreadPayload {
    Wrapped { messages: Vec<WireRow> },
    Bare(Vec<WireRow>),
}

impl ThreadPayload {
    pub fn into_rows(self) -> Vec<WireRow> {
        match self {
            ThreadPayload::Wrapped { messages } => messages,
            ThreadPayload::Bare(rows) => rows,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireProfessional {
    #[serde(alias = "ProfessionalID")]
    pub id: UserId,
    #[serde(rename = "FullName", default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(alias = "Category", default)]
    pub category: Option<String>,
}

impl From<WireProfessional> for Professional {
    fn from(wire: WireProfessional) -> Self {
        let joined = format!(
            "{} {}",
            wire.first_name.as_deref().unwrap_or_default(),
            wire.last_name.as_deref().unwrap_or_default()
        );
        let name = wire
            .full_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| joined.trim().to_string());
        let record = format::NamedRecord {
            name: Some(name.as_str()),
            role: Some(Role::Professional),
            id: Some(&wire.id),
        };
        let name = format::derive_display_name(&record);
        Professional {
            id: wire.id,
            name,
            category: wire.category.unwrap_or_default(),
        }
    }
}

/// One appointment row from `/api/{role}/sessions`.
///
/// The student route names the professional in `FullName`; the professional
/// route names the student in `student_name`. The day and the booked slot
/// come from separate columns.
#[derive(Debug, Clone, Deserialize)]
pub struct WireSession {
    #[serde(rename = "FullName", alias = "name", default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub professional_name: Option<String>,
    #[serde(default)]
    pub student: Option<String>,
    #[serde(rename = "SessionDate", alias = "scheduled_at", default)]
    pub session_date: Option<String>,
    #[serde(rename = "TimeSlot", default)]
    pub time_slot: Option<String>,
}

impl From<WireSession> for SessionEntry {
    fn from(wire: WireSession) -> Self {
        let scheduled_at = wire
            .session_date
            .as_deref()
            .and_then(|date| format::join_date_and_slot(date, wire.time_slot.as_deref()));
        SessionEntry {
            name: wire
                .full_name
                .or(wire.student_name)
                .or(wire.student)
                .or(wire.professional_name),
            scheduled_at,
        }
    }
}

/// Someone the profile owner has worked with: a student's professionals or a
/// professional's students.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileContact {
    pub id: UserId,
    pub name: String,
    pub category: Option<String>,
    pub session_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// The other party: the reviewed professional on a student's profile, the
    /// reviewing student on a professional's.
    pub name: String,
    pub rating: u8,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub member_since: Option<NaiveDateTime>,
    pub category: Option<String>,
    pub verification: Option<String>,
    pub contacts: Vec<ProfileContact>,
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
}

/// `data` of `/api/{role}/profile`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireProfile {
    pub profile: WireProfileRecord,
    #[serde(default)]
    pub professionals: Vec<WireContact>,
    #[serde(default)]
    pub students: Vec<WireContact>,
    #[serde(default)]
    pub reviews: Vec<WireReview>,
    #[serde(default)]
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireProfileRecord {
    #[serde(rename = "FullName", default)]
    pub full_name: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "VerificationStatus", default)]
    pub verification_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireContact {
    #[serde(rename = "ProfessionalID", alias = "StudentID")]
    pub id: UserId,
    #[serde(rename = "FullName", default)]
    pub full_name: Option<String>,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub session_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireReview {
    #[serde(rename = "FullName", alias = "student_name", default)]
    pub name: Option<String>,
    #[serde(rename = "Rating", default)]
    pub rating: Option<u8>,
    #[serde(rename = "FeedbackText", default)]
    pub text: Option<String>,
}

impl WireProfile {
    /// `owner` decides whose ids the contact rows carry.
    pub fn into_profile(self, owner: Role) -> Profile {
        let contact_role = match owner {
            Role::Professional => Role::Student,
            _ => Role::Professional,
        };
        let rows = if self.students.is_empty() { self.professionals } else { self.students };
        let contacts = rows
            .into_iter()
            .map(|row| ProfileContact {
                name: format::derive_display_name(&format::NamedRecord {
                    name: row.full_name.as_deref(),
                    role: Some(contact_role),
                    id: Some(&row.id),
                }),
                id: row.id,
                category: row.category.filter(|c| !c.trim().is_empty()),
                session_count: row.session_count.unwrap_or_default(),
            })
            .collect();
        let reviews = self
            .reviews
            .into_iter()
            .map(|r| Review {
                name: format::derive_display_name(&format::NamedRecord {
                    name: r.name.as_deref(),
                    ..Default::default()
                }),
                rating: r.rating.unwrap_or_default(),
                text: r.text.filter(|t| !t.trim().is_empty()),
            })
            .collect();
        let record = self.profile;
        Profile {
            name: record.full_name.unwrap_or_default(),
            email: record.email.unwrap_or_default(),
            member_since: record.created_at.as_deref().and_then(format::parse_timestamp),
            category: record.category,
            verification: record.verification_status,
            contacts,
            reviews,
            average_rating: self.average_rating,
        }
    }
}

/// The user record returned by login and by the user lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(rename = "StudentID", default)]
    pub student_id: Option<UserId>,
    #[serde(rename = "ProfessionalID", default)]
    pub professional_id: Option<UserId>,
    #[serde(rename = "AdminID", default)]
    pub admin_id: Option<UserId>,
    #[serde(default)]
    pub user_type: Option<Role>,
}

impl WireUser {
    pub fn into_identity(self, fallback_role: Option<Role>) -> Option<Identity> {
        let role = self.user_type.or(fallback_role)?;
        let role_id = match role {
            Role::Student => self.student_id,
            Role::Professional => self.professional_id,
            Role::Admin => self.admin_id,
        };
        let id = role_id.or(self.user_id).or(self.id)?;
        if id.is_empty() {
            return None;
        }
        Some(Identity { id, role })
    }
}
