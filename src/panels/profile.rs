use log::warn;

use crate::api::Backend;
use crate::api::models::{Identity, Profile, Role};
use crate::error::Result;
use crate::format;
use crate::panels::{RequestGuard, RequestToken};

pub const NO_REVIEWS: &str = "No reviews yet";
pub const NO_FEEDBACK_TEXT: &str = "No feedback text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLine {
    pub name: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLine {
    pub name: String,
    pub rating: String,
    pub text: String,
}

/// A profile reduced to the labels the page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCard {
    pub name: String,
    pub email: String,
    pub details: Vec<String>,
    pub contacts_title: &'static str,
    /// Shown instead of `contacts` when there are none.
    pub no_contacts: &'static str,
    pub contacts: Vec<ContactLine>,
    pub reviews: Vec<ReviewLine>,
}

impl ProfileCard {
    pub fn new(owner: Role, profile: &Profile) -> Self {
        let mut details = Vec::new();
        if let Some(category) = profile.category.as_deref().filter(|c| !c.is_empty()) {
            details.push(format!("Category: {category}"));
        }
        if let Some(status) = profile.verification.as_deref().filter(|s| !s.is_empty()) {
            details.push(format!("Verification: {status}"));
        }
        if let Some(since) = profile.member_since.as_ref().and_then(format::format_date_label) {
            details.push(format!("Member since {since}"));
        }
        if owner == Role::Professional {
            if let Some(avg) = profile.average_rating.filter(|_| !profile.reviews.is_empty()) {
                details.push(format!("Average rating: {avg:.1}/5"));
            }
        }

        let (contacts_title, no_contacts) = match owner {
            Role::Professional => ("Your students", "No students yet"),
            _ => ("Your professionals", "No professionals yet"),
        };
        let contacts = profile
            .contacts
            .iter()
            .map(|c| {
                let sessions = format!("Sessions: {}", c.session_count);
                let detail = match owner {
                    Role::Professional => sessions,
                    _ => format!("Category: {} · {sessions}", c.category.as_deref().unwrap_or("N/A")),
                };
                ContactLine { name: c.name.clone(), detail }
            })
            .collect();
        let reviews = profile
            .reviews
            .iter()
            .map(|r| ReviewLine {
                name: r.name.clone(),
                rating: format!("* {}/5", r.rating),
                text: r.text.clone().unwrap_or_else(|| NO_FEEDBACK_TEXT.to_string()),
            })
            .collect();

        ProfileCard {
            name: profile.name.clone(),
            email: profile.email.clone(),
            details,
            contacts_title,
            no_contacts,
            contacts,
            reviews,
        }
    }
}

pub trait ProfileView {
    fn render_profile(&mut self, card: &ProfileCard);
    fn render_profile_error(&mut self, error: &str);
}

/// The signed-in user's own profile page.
pub struct ProfilePanel {
    identity: Identity,
    card: Option<ProfileCard>,
    guard: RequestGuard,
}

impl ProfilePanel {
    pub fn new(identity: Identity) -> Self {
        Self { identity, card: None, guard: RequestGuard::default() }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn card(&self) -> Option<&ProfileCard> {
        self.card.as_ref()
    }

    pub fn begin_load(&mut self) -> RequestToken {
        self.guard.issue()
    }

    pub fn apply<V: ProfileView>(&mut self, token: RequestToken, result: Result<Profile>, view: &mut V) -> bool {
        if !self.guard.accept(token, "profile") {
            return false;
        }
        match result {
            Ok(profile) => {
                let card = ProfileCard::new(self.identity.role, &profile);
                view.render_profile(&card);
                self.card = Some(card);
            }
            Err(e) => {
                warn!("failed to load profile: {e}");
                self.card = None;
                view.render_profile_error(&format!("Error loading profile: {}", e.user_message()));
            }
        }
        true
    }

    pub async fn load<B: Backend, V: ProfileView>(&mut self, backend: &B, view: &mut V) {
        let token = self.begin_load();
        let result = backend.profile(&self.identity).await;
        self.apply(token, result, view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::envelope::Envelope;
    use crate::api::models::WireProfile;
    use crate::error::ClientError;
    use crate::testing::{Call, FakeBackend};

    #[derive(Default)]
    struct RecordingView {
        card: Option<ProfileCard>,
        error: Option<String>,
    }

    impl ProfileView for RecordingView {
        fn render_profile(&mut self, card: &ProfileCard) {
            self.card = Some(card.clone());
            self.error = None;
        }

        fn render_profile_error(&mut self, error: &str) {
            self.card = None;
            self.error = Some(error.to_string());
        }
    }

    fn decode(body: &[u8], owner: Role) -> Profile {
        Envelope::<WireProfile>::decode(200, body).unwrap().unwrap().into_profile(owner)
    }

    #[test]
    fn student_profile_lists_professionals_and_reviews() {
        let body = br#"{"status":"success","data":{
            "profile":{"StudentID":7,"FullName":"Jo Bloggs","Email":"jo@uni.edu","CreatedAt":"2026-01-05 10:00:00"},
            "professionals":[
                {"ProfessionalID":3,"FullName":"Sarah Mitchell","Category":"Anxiety","session_count":2},
                {"ProfessionalID":4,"FullName":null,"Category":null,"session_count":0}
            ],
            "reviews":[{"FeedbackID":1,"ProfessionalID":3,"FullName":"Sarah Mitchell","Rating":5,"FeedbackText":""}]
        }}"#;
        let card = ProfileCard::new(Role::Student, &decode(body, Role::Student));

        assert_eq!(card.name, "Jo Bloggs");
        assert_eq!(card.email, "jo@uni.edu");
        assert_eq!(card.details, vec!["Member since 05/01/2026".to_string()]);
        assert_eq!(card.contacts_title, "Your professionals");
        assert_eq!(
            card.contacts,
            vec![
                ContactLine { name: "Sarah Mitchell".into(), detail: "Category: Anxiety · Sessions: 2".into() },
                ContactLine { name: "Professional 4".into(), detail: "Category: N/A · Sessions: 0".into() },
            ]
        );
        assert_eq!(
            card.reviews,
            vec![ReviewLine { name: "Sarah Mitchell".into(), rating: "* 5/5".into(), text: NO_FEEDBACK_TEXT.into() }]
        );
    }

    #[test]
    fn professional_profile_lists_students_and_rating() {
        let body = br#"{"status":"success","data":{
            "profile":{"ProfessionalID":3,"FullName":"Sarah Mitchell","Email":"s@uni.edu",
                       "Category":"Anxiety","VerificationStatus":"Verified"},
            "students":[{"StudentID":7,"FullName":"Jo Bloggs","Email":"jo@uni.edu","session_count":3}],
            "reviews":[
                {"FeedbackID":2,"StudentID":7,"student_name":"Jo Bloggs","Rating":4,"FeedbackText":"Helpful"},
                {"FeedbackID":1,"StudentID":8,"student_name":"Ann","Rating":5,"FeedbackText":"Kind"}
            ],
            "average_rating":4.5
        }}"#;
        let card = ProfileCard::new(Role::Professional, &decode(body, Role::Professional));

        assert_eq!(
            card.details,
            vec![
                "Category: Anxiety".to_string(),
                "Verification: Verified".to_string(),
                "Average rating: 4.5/5".to_string(),
            ]
        );
        assert_eq!(card.contacts_title, "Your students");
        assert_eq!(card.contacts, vec![ContactLine { name: "Jo Bloggs".into(), detail: "Sessions: 3".into() }]);
        assert_eq!(card.reviews[0].text, "Helpful");
        assert_eq!(card.reviews[1].name, "Ann");
    }

    #[tokio::test]
    async fn failure_shows_error_state() {
        let backend = FakeBackend::new();
        let identity = Identity::new("7", Role::Student);
        let mut view = RecordingView::default();
        let mut panel = ProfilePanel::new(identity.clone());
        panel.load(&backend, &mut view).await;

        assert_eq!(backend.calls(), vec![Call::Profile(identity)]);
        assert_eq!(view.error.as_deref(), Some("Error loading profile: Student not found"));
        assert!(panel.card().is_none());
    }

    #[test]
    fn older_load_cannot_overwrite_newer() {
        let profile = Profile {
            name: "Jo".into(),
            email: String::new(),
            member_since: None,
            category: None,
            verification: None,
            contacts: Vec::new(),
            reviews: Vec::new(),
            average_rating: None,
        };
        let mut view = RecordingView::default();
        let mut panel = ProfilePanel::new(Identity::new("7", Role::Student));
        let first = panel.begin_load();
        let second = panel.begin_load();
        assert!(panel.apply(second, Ok(profile), &mut view));
        let late = Err(ClientError::Transport("timed out".into()));
        assert!(!panel.apply(first, late, &mut view));
        assert_eq!(view.card.as_ref().map(|c| c.name.as_str()), Some("Jo"));
    }
}
