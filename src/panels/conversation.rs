use std::collections::HashMap;

use log::{debug, warn};

use crate::api::Backend;
use crate::api::models::{
    Channel, Conversation, Identity, Message, OutgoingMessage, Professional, Role, ThreadTarget, UserId,
};
use crate::error::{Result, ValidationError};
use crate::format;
use crate::panels::{RequestGuard, RequestToken};

pub const NO_CONVERSATIONS: &str = "No conversations yet";
pub const NO_MESSAGES: &str = "No messages yet";
/// First message sent when a student reaches out to a new professional.
pub const GREETING: &str = "Hello, I would like to connect with you.";

/// One rendered chat bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLine {
    pub text: String,
    pub is_self: bool,
    pub time_label: Option<String>,
}

/// What the conversation panel needs from a screen.
pub trait ConversationView {
    fn render_conversations(&mut self, conversations: &[Conversation]);
    /// `error` is `None` when the list is genuinely empty.
    fn render_no_conversations(&mut self, error: Option<&str>);
    /// Shows the thread pane titled `title`, with no messages in it.
    fn open_thread(&mut self, title: &str);
    /// Oldest first. An empty slice is shown as [`NO_MESSAGES`].
    fn render_thread(&mut self, lines: &[ThreadLine]);
    fn render_thread_error(&mut self, error: &str);
    fn scroll_to_newest(&mut self);
    fn close_thread(&mut self);
    fn clear_input(&mut self);
    fn render_send_error(&mut self, error: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    Refresh,
    OpenAdmin,
    CloseThread,
    Send,
}

/// Widget name → action. Front ends wire widgets from this table instead of
/// hand-written callbacks.
pub const BINDINGS: &[(&str, ConversationAction)] = &[
    ("refreshConversations", ConversationAction::Refresh),
    ("messageAdminBtn", ConversationAction::OpenAdmin),
    ("chatClose", ConversationAction::CloseThread),
    ("chatSend", ConversationAction::Send),
    ("chatInput", ConversationAction::Send),
];

pub fn action_for(widget: &str) -> Option<ConversationAction> {
    BINDINGS.iter().find(|(name, _)| *name == widget).map(|(_, action)| *action)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationIntent {
    Refresh,
    Open(Conversation),
    OpenAdmin,
    CloseThread,
    Send(String),
    /// A student reaching out to a professional from the directory.
    Start(Professional),
}

impl ConversationIntent {
    /// Builds the intent for a bound widget; `input` is the message entry's text.
    pub fn from_action(action: ConversationAction, input: &str) -> Self {
        match action {
            ConversationAction::Refresh => ConversationIntent::Refresh,
            ConversationAction::OpenAdmin => ConversationIntent::OpenAdmin,
            ConversationAction::CloseThread => ConversationIntent::CloseThread,
            ConversationAction::Send => ConversationIntent::Send(input.to_string()),
        }
    }
}

/// A thread fetch to run: the caller resolves `target` and hands the result
/// back with `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadFetch {
    pub token: RequestToken,
    pub target: ThreadTarget,
}

#[derive(Debug)]
struct ActiveThread {
    target: ThreadTarget,
    messages: Vec<Message>,
}

pub struct ConversationPanel {
    identity: Identity,
    admin_username: String,
    conversations: Vec<Conversation>,
    active: Option<ActiveThread>,
    list_guard: RequestGuard,
    thread_guard: RequestGuard,
}

impl ConversationPanel {
    pub fn new(identity: Identity, admin_username: impl Into<String>) -> Self {
        Self {
            identity,
            admin_username: admin_username.into(),
            conversations: Vec::new(),
            active: None,
            list_guard: RequestGuard::default(),
            thread_guard: RequestGuard::default(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_target(&self) -> Option<&ThreadTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    pub fn messages(&self) -> &[Message] {
        self.active.as_ref().map(|a| a.messages.as_slice()).unwrap_or_default()
    }

    pub fn begin_load_conversations(&mut self) -> RequestToken {
        self.list_guard.issue()
    }

    pub fn apply_conversations<V: ConversationView>(
        &mut self,
        token: RequestToken,
        result: Result<Vec<Conversation>>,
        view: &mut V,
    ) -> bool {
        if !self.list_guard.accept(token, "conversation list") {
            return false;
        }
        match result {
            Ok(entries) => {
                self.conversations = group_conversations(entries);
                if self.conversations.is_empty() {
                    view.render_no_conversations(None);
                } else {
                    view.render_conversations(&self.conversations);
                }
            }
            Err(e) => {
                warn!("failed to load conversations: {e}");
                self.conversations.clear();
                view.render_no_conversations(Some(&e.user_message()));
            }
        }
        true
    }

    /// Makes `target` the only open thread. The pane is emptied before any
    /// of the new thread's history can arrive.
    pub fn begin_open_thread<V: ConversationView>(&mut self, target: ThreadTarget, view: &mut V) -> ThreadFetch {
        self.open_titled(target, None, view)
    }

    /// Opens a listed conversation under the name it was listed with.
    pub fn begin_open_conversation<V: ConversationView>(&mut self, conversation: &Conversation, view: &mut V) -> ThreadFetch {
        self.open_titled(conversation.target(), Some(&conversation.peer_name), view)
    }

    pub fn begin_open_professional<V: ConversationView>(&mut self, professional: &Professional, view: &mut V) -> ThreadFetch {
        let target = ThreadTarget::peer(professional.id.clone(), Role::Professional);
        self.open_titled(target, Some(&professional.name), view)
    }

    fn open_titled<V: ConversationView>(&mut self, target: ThreadTarget, name: Option<&str>, view: &mut V) -> ThreadFetch {
        let title = self.thread_title(&target, name);
        debug!("opening {:?} thread with {}", target.channel, target.peer.id);
        self.active = Some(ActiveThread { target: target.clone(), messages: Vec::new() });
        view.open_thread(&title);
        ThreadFetch { token: self.thread_guard.issue(), target }
    }

    /// The student's or professional's fixed conversation with the administrator.
    pub fn begin_open_admin_thread<V: ConversationView>(&mut self, view: &mut V) -> Result<ThreadFetch> {
        if self.identity.role == Role::Admin {
            return Err(ValidationError::UnsupportedThread.into());
        }
        let target = ThreadTarget::admin(&self.admin_username);
        Ok(self.begin_open_thread(target, view))
    }

    /// Re-fetches the open thread without clearing what is on screen.
    pub fn begin_reload_thread(&mut self) -> Option<ThreadFetch> {
        let target = self.active.as_ref()?.target.clone();
        Some(ThreadFetch { token: self.thread_guard.issue(), target })
    }

    pub fn apply_thread<V: ConversationView>(
        &mut self,
        token: RequestToken,
        result: Result<Vec<Message>>,
        view: &mut V,
    ) -> bool {
        if !self.thread_guard.accept(token, "thread") {
            return false;
        }
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        match result {
            Ok(mut messages) => {
                messages.sort_by_key(|m| m.sent_at);
                let lines: Vec<ThreadLine> = messages
                    .iter()
                    .map(|m| ThreadLine {
                        text: m.text.clone(),
                        is_self: m.sender_role == self.identity.role,
                        time_label: m.sent_at.as_ref().and_then(format::format_time_label),
                    })
                    .collect();
                active.messages = messages;
                view.render_thread(&lines);
                view.scroll_to_newest();
            }
            Err(e) => {
                warn!("failed to load thread: {e}");
                active.messages.clear();
                view.render_thread_error(&e.user_message());
            }
        }
        true
    }

    pub fn close_thread<V: ConversationView>(&mut self, view: &mut V) {
        self.active = None;
        self.thread_guard.invalidate();
        view.close_thread();
    }

    /// Checks `text` locally and builds the outgoing message. No request is
    /// made for blank text or when no thread is open.
    pub fn begin_send(&self, text: &str) -> std::result::Result<OutgoingMessage, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let active = self.active.as_ref().ok_or(ValidationError::NoActiveThread)?;
        Ok(OutgoingMessage {
            from: self.identity.clone(),
            to: active.target.clone(),
            text: text.to_string(),
        })
    }

    /// The greeting to send before a student's first conversation with
    /// `professional`, or `None` when they already have one.
    pub fn begin_start_conversation(
        &self,
        professional: &Professional,
    ) -> std::result::Result<Option<OutgoingMessage>, ValidationError> {
        if self.identity.role != Role::Student {
            return Err(ValidationError::UnsupportedThread);
        }
        let target = ThreadTarget::peer(professional.id.clone(), Role::Professional);
        if self.conversations.iter().any(|c| c.target() == target) {
            return Ok(None);
        }
        Ok(Some(OutgoingMessage {
            from: self.identity.clone(),
            to: target,
            text: GREETING.to_string(),
        }))
    }

    /// Clears the input on success, unless another thread was opened while
    /// `sent` was in flight. On failure the input is left as typed and the
    /// error is shown inline. Callers refresh list and thread after `Ok`.
    pub fn apply_send<V: ConversationView>(&mut self, sent: &OutgoingMessage, result: Result<()>, view: &mut V) -> Result<()> {
        match &result {
            Ok(()) if self.active_target() == Some(&sent.to) => view.clear_input(),
            Ok(()) => debug!("message to {} delivered after its thread was left", sent.to.peer.id),
            Err(e) => {
                warn!("message send failed: {e}");
                view.render_send_error(&e.user_message());
            }
        }
        result
    }

    fn thread_title(&self, target: &ThreadTarget, known: Option<&str>) -> String {
        if target.channel == Channel::Admin && self.identity.role != Role::Admin {
            return "Chat with Admin".to_string();
        }
        let name = known
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.conversations
                    .iter()
                    .find(|c| c.channel == target.channel && c.peer == target.peer)
                    .map(|c| c.peer_name.clone())
            })
            .unwrap_or_else(|| {
                format::derive_display_name(&format::NamedRecord {
                    name: None,
                    role: Some(target.peer.role),
                    id: Some(&target.peer.id),
                })
            });
        if self.identity.role == Role::Admin {
            format!("Chat with {}: {}", target.peer.role.label(), name)
        } else {
            format!("Chat with {name}")
        }
    }

    pub async fn load_conversations<B: Backend, V: ConversationView>(&mut self, backend: &B, view: &mut V) {
        let token = self.begin_load_conversations();
        let result = backend.conversations(&self.identity).await;
        self.apply_conversations(token, result, view);
    }

    async fn run_thread_fetch<B: Backend, V: ConversationView>(&mut self, backend: &B, view: &mut V, fetch: ThreadFetch) {
        let result = backend.thread(&self.identity, &fetch.target).await;
        self.apply_thread(fetch.token, result, view);
    }

    pub async fn open_thread<B: Backend, V: ConversationView>(&mut self, backend: &B, view: &mut V, target: ThreadTarget) {
        let fetch = self.begin_open_thread(target, view);
        self.run_thread_fetch(backend, view, fetch).await;
    }

    pub async fn open_admin_thread<B: Backend, V: ConversationView>(&mut self, backend: &B, view: &mut V) -> Result<()> {
        let fetch = self.begin_open_admin_thread(view)?;
        self.run_thread_fetch(backend, view, fetch).await;
        Ok(())
    }

    /// Greets `professional` unless a conversation already exists, then opens
    /// the thread and refreshes the list. A failed greeting opens nothing.
    pub async fn start_conversation<B: Backend, V: ConversationView>(
        &mut self,
        backend: &B,
        view: &mut V,
        professional: &Professional,
    ) -> Result<()> {
        if let Some(greeting) = self.begin_start_conversation(professional)? {
            if let Err(e) = backend.send_message(&greeting).await {
                warn!("could not reach {}: {e}", professional.id);
                view.render_send_error(&e.user_message());
                return Err(e);
            }
        }
        let fetch = self.begin_open_professional(professional, view);
        self.run_thread_fetch(backend, view, fetch).await;
        self.load_conversations(backend, view).await;
        Ok(())
    }

    pub async fn send_message<B: Backend, V: ConversationView>(&mut self, backend: &B, view: &mut V, text: &str) -> Result<()> {
        let outgoing = match self.begin_send(text) {
            Ok(outgoing) => outgoing,
            Err(e) => {
                view.render_send_error(&e.to_string());
                return Err(e.into());
            }
        };
        let result = backend.send_message(&outgoing).await;
        self.apply_send(&outgoing, result, view)?;

        if let Some(fetch) = self.begin_reload_thread() {
            let result = backend.thread(&self.identity, &fetch.target).await;
            self.apply_thread(fetch.token, result, view);
        }
        self.load_conversations(backend, view).await;
        Ok(())
    }

    pub async fn dispatch<B: Backend, V: ConversationView>(
        &mut self,
        backend: &B,
        view: &mut V,
        intent: ConversationIntent,
    ) -> Result<()> {
        match intent {
            ConversationIntent::Refresh => {
                self.load_conversations(backend, view).await;
                Ok(())
            }
            ConversationIntent::Open(conversation) => {
                let fetch = self.begin_open_conversation(&conversation, view);
                self.run_thread_fetch(backend, view, fetch).await;
                Ok(())
            }
            ConversationIntent::Start(professional) => self.start_conversation(backend, view, &professional).await,
            ConversationIntent::OpenAdmin => self.open_admin_thread(backend, view).await,
            ConversationIntent::CloseThread => {
                self.close_thread(view);
                Ok(())
            }
            ConversationIntent::Send(text) => self.send_message(backend, view, &text).await,
        }
    }
}

/// Collapses entries to one per peer and channel, keeping the newest time,
/// newest conversation first.
pub fn group_conversations(entries: Vec<Conversation>) -> Vec<Conversation> {
    let mut index: HashMap<(Channel, Role, UserId), usize> = HashMap::new();
    let mut grouped: Vec<Conversation> = Vec::new();
    for entry in entries {
        let key = (entry.channel, entry.peer.role, entry.peer.id.clone());
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut grouped[i];
                if entry.last_message_time > existing.last_message_time {
                    existing.last_message_time = entry.last_message_time;
                }
            }
            None => {
                index.insert(key, grouped.len());
                grouped.push(entry);
            }
        }
    }
    grouped.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    grouped
}
