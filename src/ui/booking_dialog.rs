use std::cell::{Cell, RefCell};
use std::rc::Rc;

use adw::prelude::*;
use chrono::{Local, NaiveDate};
use gtk4 as gtk;

use crate::api::Backend;
use crate::api::client::ApiClient;
use crate::api::models::{Identity, Professional, Slot, UserId};
use crate::panels::booking::{
    self, BookingCalendar, BookingConfirmation, BookingIntent, BookingView, MonthGrid, NO_SLOTS, SlotFetch,
    SubmitOutcome,
};
use crate::ui::{clear_children, padded};
use crate::utils::run_async_to_main;

const WEEKDAYS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

type IntentSink = Rc<RefCell<Option<Rc<dyn Fn(BookingIntent)>>>>;

/// The booking modal's widgets. Rows rendered later (days, slots) report
/// clicks through `intents`.
#[derive(Clone)]
pub struct BookingDialog {
    window: adw::Window,
    professionals: gtk::DropDown,
    professional_ids: Rc<RefCell<Vec<UserId>>>,
    month_label: gtk::Label,
    days: gtk::Grid,
    slots: gtk::Box,
    status: gtk::Label,
    submit_btn: gtk::Button,
    prev_btn: gtk::Button,
    next_btn: gtk::Button,
    close_btn: gtk::Button,
    // Set while the dialog itself updates widgets, so their signals are not
    // taken for user input.
    rendering: Rc<Cell<bool>>,
    intents: IntentSink,
    on_booked: Rc<RefCell<Option<Rc<dyn Fn(&BookingConfirmation)>>>>,
}

impl BookingDialog {
    pub fn new(parent: &impl IsA<gtk::Window>) -> Self {
        let root = padded(gtk::Orientation::Vertical, 12, 18);

        let professionals = gtk::DropDown::from_strings(&["MENTAL HEALTH PROFESSIONAL"]);
        professionals.set_hexpand(true);
        root.append(&professionals);

        let nav = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let prev_btn = gtk::Button::from_icon_name("go-previous-symbolic");
        prev_btn.set_widget_name("calPrev");
        let next_btn = gtk::Button::from_icon_name("go-next-symbolic");
        next_btn.set_widget_name("calNext");
        let month_label = gtk::Label::new(None);
        month_label.add_css_class("heading");
        month_label.set_hexpand(true);
        nav.append(&prev_btn);
        nav.append(&month_label);
        nav.append(&next_btn);
        root.append(&nav);

        let days = gtk::Grid::new();
        days.set_row_homogeneous(true);
        days.set_column_homogeneous(true);
        days.set_row_spacing(4);
        days.set_column_spacing(4);
        root.append(&days);

        let slots_title = gtk::Label::new(Some("Available times"));
        slots_title.add_css_class("heading");
        slots_title.set_halign(gtk::Align::Start);
        root.append(&slots_title);
        let slots = gtk::Box::new(gtk::Orientation::Vertical, 4);
        root.append(&slots);

        let status = gtk::Label::new(None);
        status.add_css_class("error");
        status.set_wrap(true);
        status.set_visible(false);
        root.append(&status);

        let buttons = gtk::Box::new(gtk::Orientation::Horizontal, 8);
        buttons.set_halign(gtk::Align::End);
        let close_btn = gtk::Button::with_label("Cancel");
        close_btn.set_widget_name("bookingClose");
        let submit_btn = gtk::Button::with_label("Book session");
        submit_btn.add_css_class("suggested-action");
        submit_btn.set_widget_name("bookingSubmit");
        submit_btn.set_sensitive(false);
        buttons.append(&close_btn);
        buttons.append(&submit_btn);
        root.append(&buttons);

        let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
        container.append(&adw::HeaderBar::new());
        container.append(&root);

        let window = adw::Window::builder()
            .title("Book a session")
            .transient_for(parent)
            .modal(true)
            .hide_on_close(true)
            .default_width(420)
            .content(&container)
            .build();

        Self {
            window,
            professionals,
            professional_ids: Rc::new(RefCell::new(Vec::new())),
            month_label,
            days,
            slots,
            status,
            submit_btn,
            prev_btn,
            next_btn,
            close_btn,
            rendering: Rc::new(Cell::new(false)),
            intents: Rc::new(RefCell::new(None)),
            on_booked: Rc::new(RefCell::new(None)),
        }
    }

    /// The widgets named in [`booking::BINDINGS`] that live in this dialog.
    pub fn bound_widgets(&self) -> Vec<gtk::Widget> {
        vec![
            self.close_btn.clone().upcast(),
            self.prev_btn.clone().upcast(),
            self.next_btn.clone().upcast(),
            self.submit_btn.clone().upcast(),
        ]
    }

    fn show_status(&self, message: &str) {
        self.status.set_label(message);
        self.status.set_visible(true);
    }

    fn hide_status(&self) {
        self.status.set_visible(false);
    }

    fn slot_row(&self, slot: &Slot, selected: bool) -> gtk::Widget {
        let state = if slot.booked { "BOOKED" } else { "AVAILABLE" };
        let button = gtk::Button::with_label(&format!("{}    {}", slot.time, state));
        button.set_sensitive(!slot.booked);
        if selected {
            button.add_css_class("suggested-action");
        }
        let intents = self.intents.clone();
        let time = slot.time.clone();
        button.connect_clicked(move |_| emit(&intents, BookingIntent::SelectSlot(time.clone())));
        button.upcast()
    }
}

fn emit(intents: &IntentSink, intent: BookingIntent) {
    let sink = intents.borrow().clone();
    if let Some(sink) = sink {
        sink(intent);
    }
}

impl BookingView for BookingDialog {
    fn show(&mut self) {
        self.hide_status();
        clear_children(&self.slots);
        self.window.present();
    }

    fn hide(&mut self) {
        self.window.set_visible(false);
    }

    fn render_professionals(&mut self, professionals: &[Professional], selected: Option<&UserId>) {
        let mut labels = vec!["MENTAL HEALTH PROFESSIONAL".to_string()];
        labels.extend(professionals.iter().map(|p| {
            if p.category.is_empty() { p.name.clone() } else { format!("{} ({})", p.name, p.category) }
        }));
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();

        self.rendering.set(true);
        self.professionals.set_model(Some(&gtk::StringList::new(&refs)));
        let position = selected
            .and_then(|id| professionals.iter().position(|p| &p.id == id))
            .map_or(0, |i| i as u32 + 1);
        self.professionals.set_selected(position);
        self.rendering.set(false);

        self.professional_ids.replace(professionals.iter().map(|p| p.id.clone()).collect());
    }

    fn render_professionals_error(&mut self, error: &str) {
        self.professional_ids.borrow_mut().clear();
        self.show_status(error);
    }

    fn render_calendar(&mut self, grid: &MonthGrid) {
        self.month_label.set_label(&grid.title);
        while let Some(child) = self.days.first_child() {
            self.days.remove(&child);
        }
        for (col, name) in WEEKDAYS.iter().enumerate() {
            let label = gtk::Label::new(Some(name));
            label.add_css_class("dim-label");
            self.days.attach(&label, col as i32, 0, 1, 1);
        }
        for (i, cell) in grid.days.iter().enumerate() {
            let slot = grid.leading_blanks as usize + i;
            let button = gtk::Button::with_label(&cell.day.to_string());
            button.add_css_class("flat");
            if cell.is_today {
                button.add_css_class("accent");
            }
            if cell.is_selected {
                button.add_css_class("suggested-action");
            }
            let intents = self.intents.clone();
            let date: NaiveDate = cell.date;
            button.connect_clicked(move |_| emit(&intents, BookingIntent::SelectDate(date)));
            self.days.attach(&button, (slot % 7) as i32, (slot / 7) as i32 + 1, 1, 1);
        }
    }

    fn render_slots_loading(&mut self) {
        clear_children(&self.slots);
        self.hide_status();
        let spinner = gtk::Spinner::new();
        spinner.start();
        self.slots.append(&spinner);
    }

    fn render_slots(&mut self, slots: &[Slot], selected: Option<&str>) {
        clear_children(&self.slots);
        if slots.is_empty() {
            let empty = gtk::Label::new(Some(NO_SLOTS));
            empty.add_css_class("dim-label");
            self.slots.append(&empty);
            return;
        }
        for slot in slots {
            let row = self.slot_row(slot, selected == Some(slot.time.as_str()));
            self.slots.append(&row);
        }
    }

    fn render_slots_error(&mut self, error: &str) {
        clear_children(&self.slots);
        self.show_status(error);
    }

    fn render_conflict(&mut self, message: &str) {
        self.show_status(&format!("{message}. Please pick another time."));
    }

    fn render_submit_error(&mut self, error: &str) {
        self.show_status(error);
    }

    fn set_submit_enabled(&mut self, enabled: bool) {
        self.submit_btn.set_sensitive(enabled);
    }

    fn booked(&mut self, confirmation: &BookingConfirmation) {
        let callback = self.on_booked.borrow().clone();
        if let Some(callback) = callback {
            callback(confirmation);
        }
    }
}

/// Runs a [`BookingCalendar`] against the dialog and the HTTP backend.
#[derive(Clone)]
pub struct BookingController {
    client: ApiClient,
    calendar: Rc<RefCell<BookingCalendar>>,
    dialog: BookingDialog,
}

impl BookingController {
    pub fn new(
        client: ApiClient,
        student: Identity,
        parent: &impl IsA<gtk::Window>,
        on_booked: impl Fn(&BookingConfirmation) + 'static,
    ) -> Self {
        let dialog = BookingDialog::new(parent);
        dialog.on_booked.replace(Some(Rc::new(on_booked)));
        let controller = Self {
            client,
            calendar: Rc::new(RefCell::new(BookingCalendar::new(student))),
            dialog,
        };

        let sink: Rc<dyn Fn(BookingIntent)> = {
            let controller = controller.clone();
            Rc::new(move |intent| controller.handle(intent))
        };
        controller.dialog.intents.replace(Some(sink));

        {
            let controller = controller.clone();
            controller.dialog.professionals.clone().connect_selected_notify(move |dropdown| {
                if controller.dialog.rendering.get() {
                    return;
                }
                let index = dropdown.selected() as usize;
                let picked = index
                    .checked_sub(1)
                    .and_then(|i| controller.dialog.professional_ids.borrow().get(i).cloned());
                if let Some(id) = picked {
                    controller.handle(BookingIntent::SelectProfessional(id));
                }
            });
        }
        {
            let controller = controller.clone();
            controller.dialog.window.clone().connect_close_request(move |_| {
                controller.handle(BookingIntent::Close);
                glib::Propagation::Stop
            });
        }
        controller
    }

    /// Wires the dialog's buttons plus the external `open_button`.
    pub fn bind(&self, open_button: &gtk::Button) {
        let mut widgets = self.dialog.bound_widgets();
        widgets.push(open_button.clone().upcast());
        let controller = self.clone();
        crate::ui::bind(&widgets, booking::BINDINGS, Rc::new(move |action: booking::BookingAction| controller.handle(action.into())));
    }

    pub fn handle(&self, intent: BookingIntent) {
        let mut view = self.dialog.clone();
        match intent {
            BookingIntent::Open => {
                let token = self.calendar.borrow_mut().begin_open(Local::now().date_naive(), &mut view);
                let client = self.client.clone();
                let this = self.clone();
                run_async_to_main(async move { client.professionals().await }, move |res| {
                    let mut view = this.dialog.clone();
                    this.calendar.borrow_mut().apply_professionals(token, res, &mut view);
                });
            }
            BookingIntent::Close => self.calendar.borrow_mut().close(&mut view),
            BookingIntent::PrevMonth => self.calendar.borrow_mut().prev_month(&mut view),
            BookingIntent::NextMonth => self.calendar.borrow_mut().next_month(&mut view),
            BookingIntent::SelectProfessional(id) => {
                let fetch = self.calendar.borrow_mut().select_professional(id, &mut view);
                self.fetch_slots(fetch);
            }
            BookingIntent::SelectDate(date) => {
                let fetch = self.calendar.borrow_mut().select_date(date, &mut view);
                self.fetch_slots(fetch);
            }
            BookingIntent::SelectSlot(time) => {
                let picked = self.calendar.borrow_mut().select_slot(&time, &mut view);
                if let Err(e) = picked {
                    self.dialog.show_status(&e.to_string());
                }
            }
            BookingIntent::Submit => {
                let started = self.calendar.borrow_mut().begin_submit(&mut view);
                let (token, request) = match started {
                    Ok(started) => started,
                    Err(e) => {
                        self.dialog.show_status(&e.to_string());
                        return;
                    }
                };
                let client = self.client.clone();
                let this = self.clone();
                run_async_to_main(
                    async move {
                        let res = client.book(&request).await;
                        (request, res)
                    },
                    move |(request, res)| {
                        let mut view = this.dialog.clone();
                        let outcome = this.calendar.borrow_mut().apply_submit(token, &request, res, &mut view);
                        if let SubmitOutcome::Conflict(fetch) = outcome {
                            this.fetch_slots(Some(fetch));
                        }
                    },
                );
            }
        }
    }

    fn fetch_slots(&self, fetch: Option<SlotFetch>) {
        let Some(fetch) = fetch else { return };
        let client = self.client.clone();
        let this = self.clone();
        run_async_to_main(
            async move {
                let res = client.slots(&fetch.professional, fetch.date).await;
                (fetch, res)
            },
            move |(fetch, res)| {
                let mut view = this.dialog.clone();
                this.calendar.borrow_mut().apply_slots(&fetch, res, &mut view);
            },
        );
    }
}
