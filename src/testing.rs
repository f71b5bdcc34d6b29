//! Scripted stand-in for the REST backend, used by the panel and session tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::api::Backend;
use crate::api::models::{
    BookingRequest, Conversation, Identity, Message, OutgoingMessage, Professional, Profile,
    Registration, SessionEntry, Slot, ThreadTarget, UserId,
};
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Conversations(Identity),
    Thread(ThreadTarget),
    Send(OutgoingMessage),
    Professionals,
    Slots(UserId, NaiveDate),
    Book(BookingRequest),
    Sessions(Identity),
    Profile(Identity),
    Login(String),
    Register(String),
    VerifyOtp(Identity, String),
    FetchUser(Identity),
}

/// Queued responses first, then the fallback forever.
struct Scripted<T> {
    queue: VecDeque<Result<T>>,
    fallback: Result<T>,
}

impl<T: Clone> Scripted<T> {
    fn new(fallback: Result<T>) -> Self {
        Self { queue: VecDeque::new(), fallback }
    }

    fn next(&mut self) -> Result<T> {
        self.queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

fn rejected<T>(message: &str) -> Result<T> {
    Err(ClientError::Backend { status: 401, message: message.into() })
}

struct Script {
    calls: Vec<Call>,
    conversations: Scripted<Vec<Conversation>>,
    threads: HashMap<ThreadTarget, Result<Vec<Message>>>,
    send: Scripted<()>,
    professionals: Scripted<Vec<Professional>>,
    slots: Scripted<Vec<Slot>>,
    book: Scripted<()>,
    sessions: Scripted<Vec<SessionEntry>>,
    profile: Scripted<Profile>,
    login: Scripted<Identity>,
    register: Scripted<Identity>,
    verify: Scripted<()>,
    user: Scripted<Identity>,
}

pub struct FakeBackend {
    script: Mutex<Script>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                calls: Vec::new(),
                conversations: Scripted::new(Ok(Vec::new())),
                threads: HashMap::new(),
                send: Scripted::new(Ok(())),
                professionals: Scripted::new(Ok(Vec::new())),
                slots: Scripted::new(Ok(Vec::new())),
                book: Scripted::new(Ok(())),
                sessions: Scripted::new(Ok(Vec::new())),
                profile: Scripted::new(Err(ClientError::Backend { status: 404, message: "Student not found".into() })),
                login: Scripted::new(rejected("Invalid credentials")),
                register: Scripted::new(rejected("Email already exists")),
                verify: Scripted::new(Ok(())),
                user: Scripted::new(rejected("User not found")),
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.with(|s| s.calls.iter().filter(|c| pred(c)).count())
    }

    pub fn set_conversations(&self, result: Result<Vec<Conversation>>) {
        self.with(|s| s.conversations.fallback = result);
    }

    pub fn set_thread(&self, target: ThreadTarget, result: Result<Vec<Message>>) {
        self.with(|s| {
            s.threads.insert(target, result);
        });
    }

    pub fn set_send(&self, result: Result<()>) {
        self.with(|s| s.send.fallback = result);
    }

    pub fn set_professionals(&self, result: Result<Vec<Professional>>) {
        self.with(|s| s.professionals.fallback = result);
    }

    pub fn set_slots(&self, result: Result<Vec<Slot>>) {
        self.with(|s| s.slots.fallback = result);
    }

    pub fn push_slots(&self, result: Result<Vec<Slot>>) {
        self.with(|s| s.slots.queue.push_back(result));
    }

    pub fn set_book(&self, result: Result<()>) {
        self.with(|s| s.book.fallback = result);
    }

    pub fn set_sessions(&self, result: Result<Vec<SessionEntry>>) {
        self.with(|s| s.sessions.fallback = result);
    }

    pub fn set_profile(&self, result: Result<Profile>) {
        self.with(|s| s.profile.fallback = result);
    }

    pub fn set_login(&self, result: Result<Identity>) {
        self.with(|s| s.login.fallback = result);
    }

    pub fn set_verify(&self, result: Result<()>) {
        self.with(|s| s.verify.fallback = result);
    }

    pub fn set_user(&self, result: Result<Identity>) {
        self.with(|s| s.user.fallback = result);
    }
}

impl Backend for FakeBackend {
    async fn conversations(&self, identity: &Identity) -> Result<Vec<Conversation>> {
        self.with(|s| {
            s.calls.push(Call::Conversations(identity.clone()));
            s.conversations.next()
        })
    }

    async fn thread(&self, _identity: &Identity, target: &ThreadTarget) -> Result<Vec<Message>> {
        self.with(|s| {
            s.calls.push(Call::Thread(target.clone()));
            s.threads.get(target).cloned().unwrap_or_else(|| Ok(Vec::new()))
        })
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        self.with(|s| {
            s.calls.push(Call::Send(message.clone()));
            s.send.next()
        })
    }

    async fn professionals(&self) -> Result<Vec<Professional>> {
        self.with(|s| {
            s.calls.push(Call::Professionals);
            s.professionals.next()
        })
    }

    async fn slots(&self, professional: &UserId, date: NaiveDate) -> Result<Vec<Slot>> {
        self.with(|s| {
            s.calls.push(Call::Slots(professional.clone(), date));
            s.slots.next()
        })
    }

    async fn book(&self, request: &BookingRequest) -> Result<()> {
        self.with(|s| {
            s.calls.push(Call::Book(request.clone()));
            s.book.next()
        })
    }

    async fn sessions(&self, identity: &Identity) -> Result<Vec<SessionEntry>> {
        self.with(|s| {
            s.calls.push(Call::Sessions(identity.clone()));
            s.sessions.next()
        })
    }

    async fn profile(&self, identity: &Identity) -> Result<Profile> {
        self.with(|s| {
            s.calls.push(Call::Profile(identity.clone()));
            s.profile.next()
        })
    }

    async fn login(&self, email: &str, _password: &str) -> Result<Identity> {
        self.with(|s| {
            s.calls.push(Call::Login(email.to_string()));
            s.login.next()
        })
    }

    async fn register(&self, registration: &Registration) -> Result<Identity> {
        self.with(|s| {
            s.calls.push(Call::Register(registration.email.clone()));
            s.register.next()
        })
    }

    async fn verify_otp(&self, pending: &Identity, code: &str) -> Result<()> {
        self.with(|s| {
            s.calls.push(Call::VerifyOtp(pending.clone(), code.to_string()));
            s.verify.next()
        })
    }

    async fn fetch_user(&self, pending: &Identity) -> Result<Identity> {
        self.with(|s| {
            s.calls.push(Call::FetchUser(pending.clone()));
            s.user.next()
        })
    }
}
