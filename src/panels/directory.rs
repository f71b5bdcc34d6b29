use log::warn;

use crate::api::Backend;
use crate::api::models::Professional;
use crate::error::Result;
use crate::panels::{RequestGuard, RequestToken};

pub const NO_PROFESSIONALS: &str = "No professionals found";
pub const DEFAULT_CATEGORY: &str = "General Counseling";

/// The list of professionals a student can reach out to.
pub trait DirectoryView {
    fn render_directory(&mut self, professionals: &[Professional]);
    /// `error` is `None` when nothing matches.
    fn render_no_professionals(&mut self, error: Option<&str>);
}

pub struct Directory {
    all: Vec<Professional>,
    query: String,
    guard: RequestGuard,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        Self { all: Vec::new(), query: String::new(), guard: RequestGuard::default() }
    }

    /// Professionals matching the current query, in backend order.
    pub fn visible(&self) -> Vec<Professional> {
        let needle = self.query.trim().to_lowercase();
        self.all
            .iter()
            .filter(|p| {
                needle.is_empty()
                    || p.name.to_lowercase().contains(&needle)
                    || p.category.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn begin_load(&mut self) -> RequestToken {
        self.guard.issue()
    }

    pub fn apply<V: DirectoryView>(&mut self, token: RequestToken, result: Result<Vec<Professional>>, view: &mut V) -> bool {
        if !self.guard.accept(token, "professional directory") {
            return false;
        }
        match result {
            Ok(professionals) => {
                self.all = professionals
                    .into_iter()
                    .map(|mut p| {
                        if p.category.trim().is_empty() {
                            p.category = DEFAULT_CATEGORY.to_string();
                        }
                        p
                    })
                    .collect();
                self.render(view);
            }
            Err(e) => {
                warn!("failed to load professionals: {e}");
                self.all.clear();
                view.render_no_professionals(Some(&e.user_message()));
            }
        }
        true
    }

    /// Narrows the list by name or category without refetching.
    pub fn set_query<V: DirectoryView>(&mut self, query: &str, view: &mut V) {
        self.query = query.to_string();
        self.render(view);
    }

    fn render<V: DirectoryView>(&self, view: &mut V) {
        let visible = self.visible();
        if visible.is_empty() {
            view.render_no_professionals(None);
        } else {
            view.render_directory(&visible);
        }
    }

    pub async fn load<B: Backend, V: DirectoryView>(&mut self, backend: &B, view: &mut V) {
        let token = self.begin_load();
        let result = backend.professionals().await;
        self.apply(token, result, view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::UserId;
    use crate::error::ClientError;
    use crate::testing::FakeBackend;

    #[derive(Default)]
    struct RecordingView {
        shown: Vec<String>,
        empty: Option<Option<String>>,
    }

    impl DirectoryView for RecordingView {
        fn render_directory(&mut self, professionals: &[Professional]) {
            self.shown = professionals.iter().map(|p| p.name.clone()).collect();
            self.empty = None;
        }

        fn render_no_professionals(&mut self, error: Option<&str>) {
            self.shown.clear();
            self.empty = Some(error.map(str::to_string));
        }
    }

    fn professional(id: i64, name: &str, category: &str) -> Professional {
        Professional { id: UserId::from(id), name: name.into(), category: category.into() }
    }

    #[tokio::test]
    async fn query_filters_by_name_or_category() {
        let backend = FakeBackend::new();
        backend.set_professionals(Ok(vec![
            professional(1, "Sarah Mitchell", "Anxiety & Stress"),
            professional(2, "Omar Haddad", ""),
        ]));
        let mut view = RecordingView::default();
        let mut directory = Directory::new();
        directory.load(&backend, &mut view).await;
        assert_eq!(view.shown, vec!["Sarah Mitchell", "Omar Haddad"]);
        assert_eq!(directory.visible()[1].category, DEFAULT_CATEGORY);

        directory.set_query("  STRESS ", &mut view);
        assert_eq!(view.shown, vec!["Sarah Mitchell"]);

        directory.set_query("counsel", &mut view);
        assert_eq!(view.shown, vec!["Omar Haddad"]);

        directory.set_query("nobody", &mut view);
        assert_eq!(view.empty, Some(None));
    }

    #[tokio::test]
    async fn failure_is_an_explicit_error_state() {
        let backend = FakeBackend::new();
        backend.set_professionals(Err(ClientError::Transport("connection refused".into())));
        let mut view = RecordingView::default();
        let mut directory = Directory::new();
        directory.load(&backend, &mut view).await;
        assert_eq!(view.empty, Some(Some("Error connecting to server: connection refused".into())));
        assert!(directory.visible().is_empty());
    }

    #[test]
    fn stale_list_is_discarded() {
        let mut view = RecordingView::default();
        let mut directory = Directory::new();
        let first = directory.begin_load();
        let second = directory.begin_load();
        directory.apply(second, Ok(vec![professional(2, "B", "x")]), &mut view);
        assert!(!directory.apply(first, Ok(vec![professional(1, "A", "x")]), &mut view));
        assert_eq!(view.shown, vec!["B"]);
    }
}
