use log::warn;

use crate::api::Backend;
use crate::api::models::{Identity, SessionEntry};
use crate::error::Result;
use crate::format;
use crate::panels::{RequestGuard, RequestToken};

pub const NO_SESSIONS: &str = "No scheduled sessions";
pub const UNDATED: &str = "DATE AND TIME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub name: String,
    pub when: String,
}

impl From<&SessionEntry> for SessionRow {
    fn from(entry: &SessionEntry) -> Self {
        let name = format::derive_display_name(&format::NamedRecord {
            name: entry.name.as_deref(),
            ..Default::default()
        });
        SessionRow {
            name: name.to_uppercase(),
            when: entry
                .scheduled_at
                .as_ref()
                .and_then(format::format_date_time_label)
                .unwrap_or_else(|| UNDATED.to_string()),
        }
    }
}

pub trait SessionsView {
    fn render_sessions(&mut self, rows: &[SessionRow]);
    /// `error` is `None` when there are simply no sessions.
    fn render_no_sessions(&mut self, error: Option<&str>);
}

/// Read-only "my sessions" list.
pub struct SessionsList {
    identity: Identity,
    rows: Vec<SessionRow>,
    guard: RequestGuard,
}

impl SessionsList {
    pub fn new(identity: Identity) -> Self {
        Self { identity, rows: Vec::new(), guard: RequestGuard::default() }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn rows(&self) -> &[SessionRow] {
        &self.rows
    }

    pub fn begin_load(&mut self) -> RequestToken {
        self.guard.issue()
    }

    pub fn apply<V: SessionsView>(&mut self, token: RequestToken, result: Result<Vec<SessionEntry>>, view: &mut V) -> bool {
        if !self.guard.accept(token, "session list") {
            return false;
        }
        match result {
            Ok(entries) => {
                self.rows = entries.iter().map(SessionRow::from).collect();
                if self.rows.is_empty() {
                    view.render_no_sessions(None);
                } else {
                    view.render_sessions(&self.rows);
                }
            }
            Err(e) => {
                warn!("failed to load sessions: {e}");
                self.rows.clear();
                view.render_no_sessions(Some(&e.user_message()));
            }
        }
        true
    }

    pub async fn load<B: Backend, V: SessionsView>(&mut self, backend: &B, view: &mut V) {
        let token = self.begin_load();
        let result = backend.sessions(&self.identity).await;
        self.apply(token, result, view);
    }
}
