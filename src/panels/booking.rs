//! Booking modal: pick a professional, a day on the month grid and a free slot.
//!
//! The stage is never stored; it is read off the draft, so a field being
//! cleared always drops the panel back to the stage that needs it.

use chrono::{Datelike, Local, NaiveDate};
use log::{debug, info, warn};

use crate::api::Backend;
use crate::api::models::{BookingRequest, Identity, Professional, Slot, UserId};
use crate::error::{ClientError, Result, ValidationError};
use crate::format;
use crate::panels::{RequestGuard, RequestToken};

pub const NO_SLOTS: &str = "No available time slots for this date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStage {
    Closed,
    ProfessionalSelection,
    DateSelection,
    SlotSelection,
    Submittable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingDraft {
    pub professional: Option<UserId>,
    pub date: Option<NaiveDate>,
    pub slot: Option<String>,
}

/// The month the grid shows. `month` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarCursor {
    pub year: i32,
    pub month: u32,
}

impl CalendarCursor {
    pub fn containing(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub day: u32,
    pub date: NaiveDate,
    pub is_today: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub title: String,
    /// Empty cells before the 1st in a Sunday-first week.
    pub leading_blanks: u32,
    pub days: Vec<DayCell>,
}

pub fn month_grid(cursor: CalendarCursor, today: NaiveDate, selected: Option<NaiveDate>) -> MonthGrid {
    let days: Vec<DayCell> = (1..=format::days_in_month(cursor.year, cursor.month))
        .filter_map(|day| NaiveDate::from_ymd_opt(cursor.year, cursor.month, day))
        .map(|date| DayCell {
            day: date.day(),
            date,
            is_today: date == today,
            is_selected: Some(date) == selected,
        })
        .collect();
    let leading_blanks = days
        .first()
        .map(|d| d.date.weekday().num_days_from_sunday())
        .unwrap_or(0);
    MonthGrid {
        year: cursor.year,
        month: cursor.month,
        title: format::month_title(cursor.year, cursor.month),
        leading_blanks,
        days,
    }
}

/// A slot fetch to run for `(professional, date)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotFetch {
    pub token: RequestToken,
    pub professional: UserId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfirmation {
    pub professional_name: String,
    pub date_label: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Booked(BookingConfirmation),
    /// The backend refused the slot; slots for the date must be fetched again.
    Conflict(SlotFetch),
    /// Transport failure; the draft is kept for another attempt.
    Failed,
    /// The modal was closed or reset while the request was out.
    Stale,
}

pub trait BookingView {
    fn show(&mut self);
    fn hide(&mut self);
    fn render_professionals(&mut self, professionals: &[Professional], selected: Option<&UserId>);
    fn render_professionals_error(&mut self, error: &str);
    fn render_calendar(&mut self, grid: &MonthGrid);
    fn render_slots_loading(&mut self);
    /// Booked slots are shown disabled. An empty slice is shown as [`NO_SLOTS`].
    fn render_slots(&mut self, slots: &[Slot], selected: Option<&str>);
    fn render_slots_error(&mut self, error: &str);
    fn render_conflict(&mut self, message: &str);
    fn render_submit_error(&mut self, error: &str);
    fn set_submit_enabled(&mut self, enabled: bool);
    fn booked(&mut self, confirmation: &BookingConfirmation);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Open,
    Close,
    PrevMonth,
    NextMonth,
    Submit,
}

pub const BINDINGS: &[(&str, BookingAction)] = &[
    ("bookSessionBtn", BookingAction::Open),
    ("bookingClose", BookingAction::Close),
    ("calPrev", BookingAction::PrevMonth),
    ("calNext", BookingAction::NextMonth),
    ("bookingSubmit", BookingAction::Submit),
];

pub fn action_for(widget: &str) -> Option<BookingAction> {
    BINDINGS.iter().find(|(name, _)| *name == widget).map(|(_, action)| *action)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingIntent {
    Open,
    Close,
    PrevMonth,
    NextMonth,
    SelectProfessional(UserId),
    SelectDate(NaiveDate),
    SelectSlot(String),
    Submit,
}

impl From<BookingAction> for BookingIntent {
    fn from(action: BookingAction) -> Self {
        match action {
            BookingAction::Open => BookingIntent::Open,
            BookingAction::Close => BookingIntent::Close,
            BookingAction::PrevMonth => BookingIntent::PrevMonth,
            BookingAction::NextMonth => BookingIntent::NextMonth,
            BookingAction::Submit => BookingIntent::Submit,
        }
    }
}

pub struct BookingCalendar {
    student: Identity,
    open: bool,
    today: NaiveDate,
    cursor: CalendarCursor,
    professionals: Vec<Professional>,
    draft: BookingDraft,
    slots: Vec<Slot>,
    slots_for: Option<(UserId, NaiveDate)>,
    submitting: bool,
    // Backend refusal of the last submit, shown until the next selection.
    conflict: Option<String>,
    professionals_guard: RequestGuard,
    slots_guard: RequestGuard,
    submit_guard: RequestGuard,
}

impl BookingCalendar {
    pub fn new(student: Identity) -> Self {
        let today = Local::now().date_naive();
        Self {
            student,
            open: false,
            today,
            cursor: CalendarCursor::containing(today),
            professionals: Vec::new(),
            draft: BookingDraft::default(),
            slots: Vec::new(),
            slots_for: None,
            submitting: false,
            conflict: None,
            professionals_guard: RequestGuard::default(),
            slots_guard: RequestGuard::default(),
            submit_guard: RequestGuard::default(),
        }
    }

    pub fn stage(&self) -> BookingStage {
        if !self.open {
            BookingStage::Closed
        } else if self.draft.professional.is_none() {
            BookingStage::ProfessionalSelection
        } else if self.draft.date.is_none() {
            BookingStage::DateSelection
        } else if self.can_submit() {
            BookingStage::Submittable
        } else {
            BookingStage::SlotSelection
        }
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn cursor(&self) -> CalendarCursor {
        self.cursor
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn grid(&self) -> MonthGrid {
        month_grid(self.cursor, self.today, self.draft.date)
    }

    /// Opens the modal on `today`'s month with an empty draft and returns the
    /// token for the professional list fetch.
    pub fn begin_open<V: BookingView>(&mut self, today: NaiveDate, view: &mut V) -> RequestToken {
        self.reset();
        self.open = true;
        self.today = today;
        self.cursor = CalendarCursor::containing(today);
        view.show();
        view.render_calendar(&self.grid());
        view.set_submit_enabled(false);
        self.professionals_guard.issue()
    }

    pub fn apply_professionals<V: BookingView>(
        &mut self,
        token: RequestToken,
        result: Result<Vec<Professional>>,
        view: &mut V,
    ) -> bool {
        if !self.professionals_guard.accept(token, "professional list") {
            return false;
        }
        match result {
            Ok(professionals) => {
                self.professionals = professionals;
                view.render_professionals(&self.professionals, self.draft.professional.as_ref());
            }
            Err(e) => {
                warn!("failed to load professionals: {e}");
                self.professionals.clear();
                view.render_professionals_error(&e.user_message());
            }
        }
        true
    }

    /// Choosing another professional drops the chosen slot. Slots are fetched
    /// once a date is also chosen. Ignored while a booking is in flight.
    pub fn select_professional<V: BookingView>(&mut self, professional: UserId, view: &mut V) -> Option<SlotFetch> {
        if self.draft.professional.as_ref() == Some(&professional) || self.refuse_while_submitting("professional") {
            return None;
        }
        self.draft.professional = Some(professional);
        self.invalidate_slots(view)
    }

    pub fn prev_month<V: BookingView>(&mut self, view: &mut V) {
        self.cursor = self.cursor.prev();
        view.render_calendar(&self.grid());
    }

    pub fn next_month<V: BookingView>(&mut self, view: &mut V) {
        self.cursor = self.cursor.next();
        view.render_calendar(&self.grid());
    }

    /// A new date always drops the chosen slot, even when it is the same day.
    /// Ignored while a booking is in flight.
    pub fn select_date<V: BookingView>(&mut self, date: NaiveDate, view: &mut V) -> Option<SlotFetch> {
        if self.refuse_while_submitting("date") {
            return None;
        }
        self.draft.date = Some(date);
        self.cursor = CalendarCursor::containing(date);
        view.render_calendar(&self.grid());
        self.invalidate_slots(view)
    }

    fn refuse_while_submitting(&self, what: &str) -> bool {
        if self.submitting {
            debug!("ignoring {what} change while a booking is in flight");
        }
        self.submitting
    }

    fn invalidate_slots<V: BookingView>(&mut self, view: &mut V) -> Option<SlotFetch> {
        self.conflict = None;
        self.draft.slot = None;
        self.slots.clear();
        self.slots_for = None;
        view.set_submit_enabled(false);
        match (self.draft.professional.clone(), self.draft.date) {
            (Some(professional), Some(date)) => Some(self.issue_slot_fetch(professional, date, view)),
            _ => {
                self.slots_guard.invalidate();
                None
            }
        }
    }

    fn issue_slot_fetch<V: BookingView>(&mut self, professional: UserId, date: NaiveDate, view: &mut V) -> SlotFetch {
        debug!("fetching slots for {professional} on {}", format::iso_date(date));
        view.render_slots_loading();
        SlotFetch { token: self.slots_guard.issue(), professional, date }
    }

    pub fn apply_slots<V: BookingView>(&mut self, fetch: &SlotFetch, result: Result<Vec<Slot>>, view: &mut V) -> bool {
        if !self.slots_guard.accept(fetch.token, "slot list") {
            return false;
        }
        match result {
            Ok(slots) => {
                self.slots = slots;
                self.slots_for = Some((fetch.professional.clone(), fetch.date));
                let still_free = self
                    .draft
                    .slot
                    .as_deref()
                    .is_some_and(|time| self.slots.iter().any(|s| s.time == time && !s.booked));
                if !still_free {
                    self.draft.slot = None;
                }
                view.render_slots(&self.slots, self.draft.slot.as_deref());
                if let Some(conflict) = &self.conflict {
                    view.render_conflict(conflict);
                }
            }
            Err(e) => {
                warn!("failed to load slots: {e}");
                self.slots.clear();
                self.slots_for = None;
                self.draft.slot = None;
                view.render_slots_error(&e.user_message());
            }
        }
        view.set_submit_enabled(self.can_submit());
        true
    }

    /// Booked slots are never selectable.
    pub fn select_slot<V: BookingView>(&mut self, time: &str, view: &mut V) -> std::result::Result<(), ValidationError> {
        if self.submitting {
            return Err(ValidationError::SubmitInFlight);
        }
        let slot = self
            .slots
            .iter()
            .find(|s| s.time == time)
            .ok_or(ValidationError::MissingSlot)?;
        if slot.booked {
            return Err(ValidationError::SlotBooked(slot.time.clone()));
        }
        self.draft.slot = Some(slot.time.clone());
        self.conflict = None;
        view.render_slots(&self.slots, self.draft.slot.as_deref());
        view.set_submit_enabled(self.can_submit());
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.open && !self.submitting && self.validate().is_ok()
    }

    fn validate(&self) -> std::result::Result<BookingRequest, ValidationError> {
        let professional = self.draft.professional.clone().ok_or(ValidationError::MissingProfessional)?;
        let date = self.draft.date.ok_or(ValidationError::MissingDate)?;
        let time = self.draft.slot.clone().ok_or(ValidationError::MissingSlot)?;
        if self.slots_for.as_ref() != Some(&(professional.clone(), date)) {
            return Err(ValidationError::MissingSlot);
        }
        match self.slots.iter().find(|s| s.time == time) {
            Some(slot) if !slot.booked => {}
            Some(_) => return Err(ValidationError::SlotBooked(time)),
            None => return Err(ValidationError::MissingSlot),
        }
        Ok(BookingRequest {
            student_id: self.student.id.clone(),
            professional_id: professional,
            date,
            time,
        })
    }

    pub fn begin_submit<V: BookingView>(
        &mut self,
        view: &mut V,
    ) -> std::result::Result<(RequestToken, BookingRequest), ValidationError> {
        if self.submitting {
            return Err(ValidationError::SubmitInFlight);
        }
        let request = self.validate()?;
        self.submitting = true;
        view.set_submit_enabled(false);
        Ok((self.submit_guard.issue(), request))
    }

    pub fn apply_submit<V: BookingView>(
        &mut self,
        token: RequestToken,
        request: &BookingRequest,
        result: Result<()>,
        view: &mut V,
    ) -> SubmitOutcome {
        if !self.submit_guard.accept(token, "booking") {
            return SubmitOutcome::Stale;
        }
        self.submitting = false;
        match result {
            Ok(()) => {
                let confirmation = self.confirmation(request);
                info!("booked {} on {} at {}", request.professional_id, format::iso_date(request.date), request.time);
                view.booked(&confirmation);
                self.close(view);
                SubmitOutcome::Booked(confirmation)
            }
            Err(e @ ClientError::Backend { .. }) => {
                warn!("booking rejected: {e}");
                self.draft.slot = None;
                let fetch = self.issue_slot_fetch(request.professional_id.clone(), request.date, view);
                let conflict = e.user_message();
                view.render_conflict(&conflict);
                self.conflict = Some(conflict);
                view.set_submit_enabled(false);
                SubmitOutcome::Conflict(fetch)
            }
            Err(e) => {
                warn!("booking request failed: {e}");
                view.render_submit_error(&e.user_message());
                view.set_submit_enabled(self.can_submit());
                SubmitOutcome::Failed
            }
        }
    }

    fn confirmation(&self, request: &BookingRequest) -> BookingConfirmation {
        let known = self.professionals.iter().find(|p| p.id == request.professional_id);
        let professional_name = format::derive_display_name(&format::NamedRecord {
            name: known.map(|p| p.name.as_str()),
            role: Some(crate::api::models::Role::Professional),
            id: Some(&request.professional_id),
        });
        BookingConfirmation {
            professional_name,
            date_label: format::format_date_label(&request.date).unwrap_or_default(),
            time: request.time.clone(),
        }
    }

    /// Discards the draft; responses still in flight are dropped on arrival.
    pub fn close<V: BookingView>(&mut self, view: &mut V) {
        self.reset();
        view.hide();
    }

    fn reset(&mut self) {
        self.open = false;
        self.draft = BookingDraft::default();
        self.slots.clear();
        self.slots_for = None;
        self.submitting = false;
        self.conflict = None;
        self.professionals_guard.invalidate();
        self.slots_guard.invalidate();
        self.submit_guard.invalidate();
    }

    pub async fn open<B: Backend, V: BookingView>(&mut self, backend: &B, view: &mut V, today: NaiveDate) {
        let token = self.begin_open(today, view);
        let result = backend.professionals().await;
        self.apply_professionals(token, result, view);
    }

    async fn run_slot_fetch<B: Backend, V: BookingView>(&mut self, backend: &B, view: &mut V, fetch: Option<SlotFetch>) {
        if let Some(fetch) = fetch {
            let result = backend.slots(&fetch.professional, fetch.date).await;
            self.apply_slots(&fetch, result, view);
        }
    }

    /// Validation failures are returned before any request is made.
    pub async fn submit<B: Backend, V: BookingView>(&mut self, backend: &B, view: &mut V) -> Result<SubmitOutcome> {
        let (token, request) = self.begin_submit(view)?;
        let result = backend.book(&request).await;
        let outcome = self.apply_submit(token, &request, result, view);
        if let SubmitOutcome::Conflict(fetch) = &outcome {
            self.run_slot_fetch(backend, view, Some(fetch.clone())).await;
        }
        Ok(outcome)
    }

    pub async fn dispatch<B: Backend, V: BookingView>(
        &mut self,
        backend: &B,
        view: &mut V,
        intent: BookingIntent,
    ) -> Result<Option<SubmitOutcome>> {
        match intent {
            BookingIntent::Open => self.open(backend, view, Local::now().date_naive()).await,
            BookingIntent::Close => self.close(view),
            BookingIntent::PrevMonth => self.prev_month(view),
            BookingIntent::NextMonth => self.next_month(view),
            BookingIntent::SelectProfessional(id) => {
                let fetch = self.select_professional(id, view);
                self.run_slot_fetch(backend, view, fetch).await;
            }
            BookingIntent::SelectDate(date) => {
                let fetch = self.select_date(date, view);
                self.run_slot_fetch(backend, view, fetch).await;
            }
            BookingIntent::SelectSlot(time) => self.select_slot(&time, view)?,
            BookingIntent::Submit => return self.submit(backend, view).await.map(Some),
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Role;
    use crate::testing::{Call, FakeBackend};

    #[derive(Default)]
    struct RecordingView {
        visible: bool,
        professionals: Vec<Professional>,
        grid: Option<MonthGrid>,
        slots: Option<Vec<Slot>>,
        selected_slot: Option<String>,
        slots_loading: bool,
        slots_error: Option<String>,
        conflict: Option<String>,
        submit_error: Option<String>,
        submit_enabled: bool,
        confirmations: Vec<BookingConfirmation>,
    }

    impl BookingView for RecordingView {
        fn show(&mut self) {
            self.visible = true;
        }

        fn hide(&mut self) {
            self.visible = false;
        }

        fn render_professionals(&mut self, professionals: &[Professional], _selected: Option<&UserId>) {
            self.professionals = professionals.to_vec();
        }

        fn render_professionals_error(&mut self, _error: &str) {
            self.professionals.clear();
        }

        fn render_calendar(&mut self, grid: &MonthGrid) {
            self.grid = Some(grid.clone());
        }

        // Mirrors the dialog, which hides its status line while slots load.
        fn render_slots_loading(&mut self) {
            self.slots_loading = true;
            self.conflict = None;
        }

        fn render_slots(&mut self, slots: &[Slot], selected: Option<&str>) {
            self.slots_loading = false;
            self.slots = Some(slots.to_vec());
            self.selected_slot = selected.map(str::to_string);
        }

        fn render_slots_error(&mut self, error: &str) {
            self.slots_loading = false;
            self.slots = None;
            self.slots_error = Some(error.to_string());
        }

        fn render_conflict(&mut self, message: &str) {
            self.conflict = Some(message.to_string());
        }

        fn render_submit_error(&mut self, error: &str) {
            self.submit_error = Some(error.to_string());
        }

        fn set_submit_enabled(&mut self, enabled: bool) {
            self.submit_enabled = enabled;
        }

        fn booked(&mut self, confirmation: &BookingConfirmation) {
            self.confirmations.push(confirmation.clone());
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn day_slots() -> Vec<Slot> {
        vec![Slot::taken("09:00"), Slot::available("11:00"), Slot::available("14:00")]
    }

    async fn ready(backend: &FakeBackend, view: &mut RecordingView) -> BookingCalendar {
        backend.set_professionals(Ok(vec![Professional {
            id: UserId::from(1),
            name: "Sarah Mitchell".into(),
            category: "Anxiety & Stress".into(),
        }]));
        backend.set_slots(Ok(day_slots()));
        let mut calendar = BookingCalendar::new(Identity::new("3", Role::Student));
        calendar.open(backend, view, day(1)).await;
        calendar.dispatch(backend, view, BookingIntent::SelectProfessional(UserId::from(1))).await.unwrap();
        calendar.dispatch(backend, view, BookingIntent::SelectDate(day(10))).await.unwrap();
        calendar
    }

    #[test]
    fn grid_starts_on_sunday() {
        let jan = month_grid(CalendarCursor { year: 2026, month: 1 }, day(10), Some(day(10)));
        assert_eq!(jan.title, "January 2026");
        assert_eq!(jan.leading_blanks, 4);
        assert_eq!(jan.days.len(), 31);
        assert!(jan.days.iter().all(|d| !d.is_today && !d.is_selected));

        let feb = month_grid(CalendarCursor { year: 2026, month: 2 }, day(10), Some(day(12)));
        assert_eq!(feb.leading_blanks, 0);
        assert!(feb.days[9].is_today);
        assert!(feb.days[11].is_selected);
    }

    #[test]
    fn cursor_wraps_years() {
        let jan = CalendarCursor { year: 2026, month: 1 };
        assert_eq!(jan.prev(), CalendarCursor { year: 2025, month: 12 });
        assert_eq!(jan.prev().next(), jan);
    }

    #[tokio::test]
    async fn stages_follow_the_draft() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = BookingCalendar::new(Identity::new("3", Role::Student));
        assert_eq!(calendar.stage(), BookingStage::Closed);

        calendar.open(&backend, &mut view, day(1)).await;
        assert_eq!(calendar.stage(), BookingStage::ProfessionalSelection);
        assert!(view.visible);

        calendar.select_professional(UserId::from(1), &mut view);
        assert_eq!(calendar.stage(), BookingStage::DateSelection);

        calendar.next_month(&mut view);
        assert_eq!(calendar.stage(), BookingStage::DateSelection);
        assert_eq!(view.grid.as_ref().map(|g| g.month), Some(3));

        let fetch = calendar.select_date(day(10), &mut view).unwrap();
        assert_eq!(calendar.stage(), BookingStage::SlotSelection);
        assert!(view.slots_loading);
        calendar.apply_slots(&fetch, Ok(day_slots()), &mut view);
        calendar.select_slot("11:00", &mut view).unwrap();
        assert_eq!(calendar.stage(), BookingStage::Submittable);
        assert!(view.submit_enabled);
    }

    #[tokio::test]
    async fn booked_slot_never_enables_submission() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = ready(&backend, &mut view).await;

        let err = calendar.select_slot("09:00", &mut view).unwrap_err();
        assert_eq!(err, ValidationError::SlotBooked("09:00".into()));
        assert!(!calendar.can_submit());
        assert!(!view.submit_enabled);

        let err = calendar.submit(&backend, &mut view).await.unwrap_err();
        assert_eq!(err, ClientError::Validation(ValidationError::MissingSlot));
        assert_eq!(backend.count(|c| matches!(c, Call::Book(_))), 0);
    }

    #[tokio::test]
    async fn free_slot_posts_exactly_one_booking() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = ready(&backend, &mut view).await;

        calendar.dispatch(&backend, &mut view, BookingIntent::SelectSlot("11:00".into())).await.unwrap();
        let outcome = calendar.dispatch(&backend, &mut view, BookingIntent::Submit).await.unwrap();

        let expected = BookingRequest {
            student_id: UserId::from(3),
            professional_id: UserId::from(1),
            date: day(10),
            time: "11:00".into(),
        };
        let books: Vec<Call> = backend.calls().into_iter().filter(|c| matches!(c, Call::Book(_))).collect();
        assert_eq!(books, vec![Call::Book(expected)]);
        assert!(matches!(outcome, Some(SubmitOutcome::Booked(_))));
        assert_eq!(view.confirmations[0].professional_name, "Sarah Mitchell");
        assert_eq!(view.confirmations[0].date_label, "10/02/2026");
        assert!(!view.visible);
        assert_eq!(calendar.stage(), BookingStage::Closed);
        assert_eq!(calendar.draft(), &BookingDraft::default());
    }

    #[tokio::test]
    async fn changing_date_clears_the_slot() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = ready(&backend, &mut view).await;
        calendar.select_slot("11:00", &mut view).unwrap();
        assert_eq!(calendar.stage(), BookingStage::Submittable);

        let fetch = calendar.select_date(day(11), &mut view);
        assert_eq!(calendar.draft().slot, None);
        assert_ne!(calendar.stage(), BookingStage::Submittable);
        assert!(!view.submit_enabled);
        assert_eq!(fetch.map(|f| f.date), Some(day(11)));
    }

    #[tokio::test]
    async fn switching_professional_rekeys_slots() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = ready(&backend, &mut view).await;
        calendar.select_slot("11:00", &mut view).unwrap();

        let fetch = calendar.select_professional(UserId::from(2), &mut view).unwrap();
        assert_eq!((fetch.professional.clone(), fetch.date), (UserId::from(2), day(10)));
        assert_eq!(calendar.draft().slot, None);
        assert!(calendar.slots().is_empty());
        assert!(calendar.select_professional(UserId::from(2), &mut view).is_none());
    }

    #[test]
    fn stale_slot_response_is_discarded() {
        let mut view = RecordingView::default();
        let mut calendar = BookingCalendar::new(Identity::new("3", Role::Student));
        calendar.begin_open(day(1), &mut view);
        calendar.select_professional(UserId::from(1), &mut view);
        let a = calendar.select_date(day(10), &mut view).unwrap();
        let b = calendar.select_date(day(11), &mut view).unwrap();

        assert!(calendar.apply_slots(&b, Ok(vec![Slot::available("16:00")]), &mut view));
        assert!(!calendar.apply_slots(&a, Ok(day_slots()), &mut view));
        assert_eq!(calendar.slots(), &[Slot::available("16:00")]);
        assert!(calendar.select_slot("11:00", &mut view).is_err());
    }

    #[tokio::test]
    async fn empty_slot_list_is_shown_as_such() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = ready(&backend, &mut view).await;
        backend.set_slots(Ok(Vec::new()));
        calendar.dispatch(&backend, &mut view, BookingIntent::SelectDate(day(12))).await.unwrap();
        assert_eq!(view.slots, Some(Vec::new()));
        assert!(!calendar.can_submit());
    }

    #[tokio::test]
    async fn rejected_booking_refetches_and_shows_conflict() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = ready(&backend, &mut view).await;
        calendar.select_slot("11:00", &mut view).unwrap();

        backend.set_book(Err(ClientError::Backend { status: 409, message: "Slot already booked".into() }));
        backend.push_slots(Ok(vec![Slot::taken("09:00"), Slot::taken("11:00"), Slot::available("14:00")]));
        let outcome = calendar.submit(&backend, &mut view).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Conflict(_)));
        assert!(!view.slots_loading);
        assert_eq!(view.conflict.as_deref(), Some("Slot already booked"));
        assert!(view.visible);
        assert_eq!(calendar.stage(), BookingStage::SlotSelection);
        assert_eq!(backend.count(|c| matches!(c, Call::Slots(_, d) if *d == day(10))), 2);
        assert!(calendar.slots().iter().any(|s| s.time == "11:00" && s.booked));
        assert!(calendar.select_slot("11:00", &mut view).is_err());
    }

    #[test]
    fn conflict_notice_survives_the_refetch() {
        let mut view = RecordingView::default();
        let mut calendar = BookingCalendar::new(Identity::new("3", Role::Student));
        calendar.begin_open(day(1), &mut view);
        calendar.select_professional(UserId::from(1), &mut view);
        let fetch = calendar.select_date(day(10), &mut view).unwrap();
        calendar.apply_slots(&fetch, Ok(day_slots()), &mut view);
        calendar.select_slot("11:00", &mut view).unwrap();

        let (token, request) = calendar.begin_submit(&mut view).unwrap();
        let rejected = Err(ClientError::Backend { status: 409, message: "Slot already booked".into() });
        let SubmitOutcome::Conflict(refetch) = calendar.apply_submit(token, &request, rejected, &mut view) else {
            panic!("expected a conflict");
        };
        assert!(view.slots_loading);
        assert_eq!(view.conflict.as_deref(), Some("Slot already booked"));

        calendar.apply_slots(&refetch, Ok(vec![Slot::taken("11:00"), Slot::available("14:00")]), &mut view);
        assert_eq!(view.conflict.as_deref(), Some("Slot already booked"));

        calendar.select_slot("14:00", &mut view).unwrap();
        let again = calendar.select_date(day(12), &mut view).unwrap();
        calendar.apply_slots(&again, Ok(day_slots()), &mut view);
        assert_eq!(view.conflict, None);
    }

    #[test]
    fn draft_is_locked_while_booking_is_in_flight() {
        let mut view = RecordingView::default();
        let mut calendar = BookingCalendar::new(Identity::new("3", Role::Student));
        calendar.begin_open(day(1), &mut view);
        calendar.select_professional(UserId::from(1), &mut view);
        let fetch = calendar.select_date(day(10), &mut view).unwrap();
        calendar.apply_slots(&fetch, Ok(day_slots()), &mut view);
        calendar.select_slot("11:00", &mut view).unwrap();
        let (token, request) = calendar.begin_submit(&mut view).unwrap();

        assert!(calendar.select_date(day(12), &mut view).is_none());
        assert!(calendar.select_professional(UserId::from(2), &mut view).is_none());
        assert_eq!(calendar.select_slot("14:00", &mut view), Err(ValidationError::SubmitInFlight));
        assert_eq!(calendar.draft().date, Some(day(10)));
        assert_eq!(calendar.draft().professional, Some(UserId::from(1)));

        let rejected = Err(ClientError::Backend { status: 409, message: "Slot already booked".into() });
        let SubmitOutcome::Conflict(refetch) = calendar.apply_submit(token, &request, rejected, &mut view) else {
            panic!("expected a conflict");
        };
        assert_eq!((refetch.professional.clone(), refetch.date), (UserId::from(1), day(10)));
        assert!(calendar.apply_slots(&refetch, Ok(vec![Slot::taken("11:00")]), &mut view));
        assert_eq!(view.grid.as_ref().and_then(|g| g.days.iter().find(|d| d.is_selected)).map(|d| d.date), Some(day(10)));

        let next = calendar.select_date(day(12), &mut view).unwrap();
        assert_eq!(next.date, day(12));
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_draft() {
        let backend = FakeBackend::new();
        let mut view = RecordingView::default();
        let mut calendar = ready(&backend, &mut view).await;
        calendar.select_slot("14:00", &mut view).unwrap();

        backend.set_book(Err(ClientError::Transport("connection reset".into())));
        let outcome = calendar.submit(&backend, &mut view).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Failed);
        assert!(view.submit_error.is_some());
        assert_eq!(calendar.draft().slot.as_deref(), Some("14:00"));
        assert!(view.submit_enabled);
    }

    #[test]
    fn second_submit_while_in_flight_is_refused() {
        let mut view = RecordingView::default();
        let mut calendar = BookingCalendar::new(Identity::new("3", Role::Student));
        calendar.begin_open(day(1), &mut view);
        calendar.select_professional(UserId::from(1), &mut view);
        let fetch = calendar.select_date(day(10), &mut view).unwrap();
        calendar.apply_slots(&fetch, Ok(day_slots()), &mut view);
        calendar.select_slot("11:00", &mut view).unwrap();

        let (token, request) = calendar.begin_submit(&mut view).unwrap();
        assert_eq!(calendar.begin_submit(&mut view).unwrap_err(), ValidationError::SubmitInFlight);

        calendar.close(&mut view);
        assert_eq!(calendar.apply_submit(token, &request, Ok(()), &mut view), SubmitOutcome::Stale);
        assert!(view.confirmations.is_empty());
    }

    #[test]
    fn binding_table_resolves_widgets() {
        assert_eq!(action_for("calNext"), Some(BookingAction::NextMonth));
        assert_eq!(BookingIntent::from(BookingAction::Submit), BookingIntent::Submit);
        assert_eq!(action_for("unknown"), None);
    }
}
