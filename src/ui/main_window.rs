use std::cell::RefCell;
use std::rc::Rc;

use adw::prelude::*;
use gtk4 as gtk;
use log::warn;

use crate::api::Backend;
use crate::api::client::ApiClient;
use crate::api::models::{Conversation, Identity, Professional, Role};
use crate::panels::conversation::{self, ConversationAction, ConversationPanel, ConversationView, ThreadFetch, ThreadLine};
use crate::panels::profile::{NO_REVIEWS, ProfileCard, ProfilePanel, ProfileView};
use crate::panels::sessions::{NO_SESSIONS, SessionRow, SessionsList, SessionsView};
use crate::ui::booking_dialog::BookingController;
use crate::ui::chat_view::ChatView;
use crate::ui::directory_dialog::show_directory_dialog;
use crate::ui::sidebar::Sidebar;
use crate::ui::{AppContext, bind, clear_children, padded, toast};
use crate::utils::run_async_to_main;

/// Sidebar and chat pane together make up the conversation panel's screen.
#[derive(Clone)]
struct ChatScreen {
    sidebar: Sidebar,
    chat: ChatView,
    overlay: adw::ToastOverlay,
}

impl ConversationView for ChatScreen {
    fn render_conversations(&mut self, conversations: &[Conversation]) {
        self.sidebar.set_items(conversations);
    }

    fn render_no_conversations(&mut self, error: Option<&str>) {
        self.sidebar.set_empty(error);
        if let Some(error) = error {
            toast(&self.overlay, &format!("Failed to load conversations: {error}"));
        }
    }

    fn open_thread(&mut self, title: &str) {
        self.chat.open(title);
    }

    fn render_thread(&mut self, lines: &[ThreadLine]) {
        self.chat.set_lines(lines);
    }

    fn render_thread_error(&mut self, error: &str) {
        self.chat.show_thread_error(error);
    }

    fn scroll_to_newest(&mut self) {
        self.chat.scroll_to_bottom();
    }

    fn close_thread(&mut self) {
        self.chat.close();
    }

    fn clear_input(&mut self) {
        self.chat.clear_input();
    }

    fn render_send_error(&mut self, error: &str) {
        self.chat.show_error(error);
        toast(&self.overlay, error);
    }
}

#[derive(Clone)]
struct Messages {
    client: ApiClient,
    panel: Rc<RefCell<ConversationPanel>>,
    screen: ChatScreen,
}

impl Messages {
    fn identity(&self) -> Identity {
        self.panel.borrow().identity().clone()
    }

    fn handle(&self, action: ConversationAction) {
        match action {
            ConversationAction::Refresh => self.refresh(),
            ConversationAction::OpenAdmin => self.open_admin(),
            ConversationAction::CloseThread => {
                let mut view = self.screen.clone();
                self.panel.borrow_mut().close_thread(&mut view);
            }
            ConversationAction::Send => self.send(),
        }
    }

    fn refresh(&self) {
        let token = self.panel.borrow_mut().begin_load_conversations();
        let client = self.client.clone();
        let identity = self.identity();
        let this = self.clone();
        run_async_to_main(async move { client.conversations(&identity).await }, move |res| {
            let mut view = this.screen.clone();
            this.panel.borrow_mut().apply_conversations(token, res, &mut view);
        });
    }

    fn open(&self, conversation: &Conversation) {
        let mut view = self.screen.clone();
        let fetch = self.panel.borrow_mut().begin_open_conversation(conversation, &mut view);
        self.fetch_thread(fetch);
    }

    /// Greets a professional picked from the directory, then opens the thread.
    fn start(&self, professional: Professional) {
        let started = self.panel.borrow().begin_start_conversation(&professional);
        let greeting = match started {
            Ok(greeting) => greeting,
            Err(e) => {
                toast(&self.screen.overlay, &e.to_string());
                return;
            }
        };
        let Some(greeting) = greeting else {
            self.open_professional(&professional);
            return;
        };
        let client = self.client.clone();
        let this = self.clone();
        run_async_to_main(async move { client.send_message(&greeting).await }, move |res| match res {
            Ok(()) => {
                this.open_professional(&professional);
                this.refresh();
            }
            Err(e) => {
                warn!("could not reach {}: {e}", professional.id);
                toast(&this.screen.overlay, &format!("Could not message {}: {}", professional.name, e.user_message()));
            }
        });
    }

    fn open_professional(&self, professional: &Professional) {
        let mut view = self.screen.clone();
        let fetch = self.panel.borrow_mut().begin_open_professional(professional, &mut view);
        self.fetch_thread(fetch);
    }

    fn open_admin(&self) {
        let mut view = self.screen.clone();
        let started = self.panel.borrow_mut().begin_open_admin_thread(&mut view);
        match started {
            Ok(fetch) => self.fetch_thread(fetch),
            Err(e) => toast(&self.screen.overlay, &e.user_message()),
        }
    }

    fn fetch_thread(&self, fetch: ThreadFetch) {
        let token = fetch.token;
        let client = self.client.clone();
        let identity = self.identity();
        let this = self.clone();
        run_async_to_main(async move { client.thread(&identity, &fetch.target).await }, move |res| {
            let mut view = this.screen.clone();
            this.panel.borrow_mut().apply_thread(token, res, &mut view);
        });
    }

    fn send(&self) {
        let text = self.screen.chat.input_text();
        let outgoing = match self.panel.borrow().begin_send(&text) {
            Ok(outgoing) => outgoing,
            Err(e) => {
                self.screen.chat.show_error(&e.to_string());
                return;
            }
        };
        self.screen.chat.set_sending(true);
        let client = self.client.clone();
        let this = self.clone();
        let message = outgoing.clone();
        run_async_to_main(async move { client.send_message(&message).await }, move |res| {
            this.screen.chat.set_sending(false);
            let mut view = this.screen.clone();
            let sent = this.panel.borrow_mut().apply_send(&outgoing, res, &mut view);
            if sent.is_ok() {
                let reload = this.panel.borrow_mut().begin_reload_thread();
                if let Some(fetch) = reload {
                    this.fetch_thread(fetch);
                }
                this.refresh();
            }
        });
    }
}

#[derive(Clone)]
struct SessionsPane {
    root: gtk::Box,
    list: gtk::Box,
    empty: gtk::Label,
}

impl SessionsPane {
    fn new() -> Self {
        let root = padded(gtk::Orientation::Vertical, 8, 12);
        let title = gtk::Label::new(Some("My sessions"));
        title.add_css_class("title-3");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let empty = gtk::Label::new(Some(NO_SESSIONS));
        empty.add_css_class("dim-label");
        empty.set_visible(false);
        root.append(&empty);

        let list = gtk::Box::new(gtk::Orientation::Vertical, 6);
        let scroller = gtk::ScrolledWindow::builder().vexpand(true).child(&list).build();
        root.append(&scroller);
        Self { root, list, empty }
    }
}

impl SessionsView for SessionsPane {
    fn render_sessions(&mut self, rows: &[SessionRow]) {
        clear_children(&self.list);
        self.empty.set_visible(false);
        for row in rows {
            let line = gtk::Box::new(gtk::Orientation::Horizontal, 12);
            line.add_css_class("card");
            let name = gtk::Label::new(Some(&row.name));
            name.set_hexpand(true);
            name.set_halign(gtk::Align::Start);
            name.set_margin_start(10);
            let when = gtk::Label::new(Some(&row.when));
            when.add_css_class("dim-label");
            when.set_margin_end(10);
            line.append(&name);
            line.append(&when);
            self.list.append(&line);
        }
    }

    fn render_no_sessions(&mut self, error: Option<&str>) {
        clear_children(&self.list);
        self.empty.set_label(error.unwrap_or(NO_SESSIONS));
        self.empty.set_visible(true);
    }
}

#[derive(Clone)]
struct Sessions {
    client: ApiClient,
    list: Rc<RefCell<SessionsList>>,
    pane: SessionsPane,
}

impl Sessions {
    fn load(&self) {
        let token = self.list.borrow_mut().begin_load();
        let client = self.client.clone();
        let identity = self.list.borrow().identity().clone();
        let this = self.clone();
        run_async_to_main(async move { client.sessions(&identity).await }, move |res| {
            let mut view = this.pane.clone();
            this.list.borrow_mut().apply(token, res, &mut view);
        });
    }
}

#[derive(Clone)]
struct ProfilePane {
    root: gtk::Box,
    name: gtk::Label,
    email: gtk::Label,
    details: gtk::Box,
    contacts_title: gtk::Label,
    contacts: gtk::Box,
    reviews: gtk::Box,
    error: gtk::Label,
}

fn section_title(text: &str) -> gtk::Label {
    let label = gtk::Label::new(Some(text));
    label.add_css_class("heading");
    label.set_halign(gtk::Align::Start);
    label.set_margin_top(8);
    label
}

fn dim_line(text: &str) -> gtk::Label {
    let label = gtk::Label::new(Some(text));
    label.add_css_class("dim-label");
    label.set_halign(gtk::Align::Start);
    label.set_wrap(true);
    label
}

impl ProfilePane {
    fn new() -> Self {
        let root = padded(gtk::Orientation::Vertical, 6, 12);
        let name = gtk::Label::new(None);
        name.add_css_class("title-2");
        name.set_halign(gtk::Align::Start);
        let email = dim_line("");
        let details = gtk::Box::new(gtk::Orientation::Vertical, 2);
        let contacts_title = section_title("");
        let contacts = gtk::Box::new(gtk::Orientation::Vertical, 6);
        let reviews = gtk::Box::new(gtk::Orientation::Vertical, 6);
        let error = gtk::Label::new(None);
        error.add_css_class("error");
        error.set_visible(false);

        let body = gtk::Box::new(gtk::Orientation::Vertical, 6);
        body.append(&name);
        body.append(&email);
        body.append(&details);
        body.append(&contacts_title);
        body.append(&contacts);
        body.append(&section_title("Reviews"));
        body.append(&reviews);
        root.append(&error);
        root.append(&gtk::ScrolledWindow::builder().vexpand(true).child(&body).build());
        Self { root, name, email, details, contacts_title, contacts, reviews, error }
    }
}

impl ProfileView for ProfilePane {
    fn render_profile(&mut self, card: &ProfileCard) {
        self.error.set_visible(false);
        self.name.set_label(&card.name);
        self.email.set_label(&card.email);
        clear_children(&self.details);
        for line in &card.details {
            self.details.append(&dim_line(line));
        }

        self.contacts_title.set_label(card.contacts_title);
        clear_children(&self.contacts);
        if card.contacts.is_empty() {
            self.contacts.append(&dim_line(card.no_contacts));
        }
        for contact in &card.contacts {
            let column = padded(gtk::Orientation::Vertical, 2, 8);
            column.add_css_class("card");
            let name = gtk::Label::new(Some(&contact.name));
            name.set_halign(gtk::Align::Start);
            column.append(&name);
            column.append(&dim_line(&contact.detail));
            self.contacts.append(&column);
        }

        clear_children(&self.reviews);
        if card.reviews.is_empty() {
            self.reviews.append(&dim_line(NO_REVIEWS));
        }
        for review in &card.reviews {
            let column = gtk::Box::new(gtk::Orientation::Vertical, 2);
            let name = gtk::Label::new(Some(&format!("{}  {}", review.name, review.rating)));
            name.set_halign(gtk::Align::Start);
            column.append(&name);
            column.append(&dim_line(&review.text));
            self.reviews.append(&column);
        }
    }

    fn render_profile_error(&mut self, error: &str) {
        self.error.set_label(error);
        self.error.set_visible(true);
    }
}

#[derive(Clone)]
struct Profiles {
    client: ApiClient,
    panel: Rc<RefCell<ProfilePanel>>,
    pane: ProfilePane,
}

impl Profiles {
    fn load(&self) {
        let token = self.panel.borrow_mut().begin_load();
        let client = self.client.clone();
        let identity = self.panel.borrow().identity().clone();
        let this = self.clone();
        run_async_to_main(async move { client.profile(&identity).await }, move |res| {
            let mut view = this.pane.clone();
            this.panel.borrow_mut().apply(token, res, &mut view);
        });
    }
}

pub fn show_main_window(ctx: &AppContext, identity: Identity) {
    let window = adw::ApplicationWindow::builder()
        .application(&ctx.app)
        .title("BetterSpace")
        .default_width(960)
        .default_height(640)
        .build();

    let overlay = adw::ToastOverlay::new();

    let sidebar = Sidebar::new();
    let chat = ChatView::new();
    let split = adw::Flap::builder().reveal_flap(true).locked(true).modal(false).build();
    split.set_flap(Some(&sidebar.widget()));
    split.set_content(Some(&chat.widget()));

    let pages = adw::ViewStack::new();
    pages.add_titled(&split, Some("messages"), "Messages");
    let sessions_pane = SessionsPane::new();
    let profile_pane = ProfilePane::new();
    if identity.role != Role::Admin {
        pages.add_titled(&sessions_pane.root, Some("sessions"), "Sessions");
        pages.add_titled(&profile_pane.root, Some("profile"), "Profile");
    }
    overlay.set_child(Some(&pages));

    let header = adw::HeaderBar::new();
    let switcher = adw::ViewSwitcher::builder()
        .stack(&pages)
        .policy(adw::ViewSwitcherPolicy::Wide)
        .build();
    header.set_title_widget(Some(&switcher));

    let refresh_btn = gtk::Button::from_icon_name("view-refresh-symbolic");
    refresh_btn.set_tooltip_text(Some("Refresh conversations"));
    refresh_btn.set_widget_name("refreshConversations");
    header.pack_start(&refresh_btn);

    let admin_btn = gtk::Button::with_label("Message admin");
    admin_btn.set_widget_name("messageAdminBtn");
    admin_btn.set_visible(identity.role != Role::Admin);
    header.pack_start(&admin_btn);

    let logout_btn = gtk::Button::with_label("Log out");
    header.pack_end(&logout_btn);

    let find_btn = gtk::Button::from_icon_name("system-search-symbolic");
    find_btn.set_tooltip_text(Some("Find a professional"));
    find_btn.set_visible(identity.role == Role::Student);
    header.pack_start(&find_btn);

    let book_btn = gtk::Button::with_label("Book session");
    book_btn.add_css_class("suggested-action");
    book_btn.set_widget_name("bookSessionBtn");
    book_btn.set_visible(identity.role == Role::Student);
    header.pack_end(&book_btn);

    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));
    window.present();

    let messages = Messages {
        client: ctx.client.clone(),
        panel: Rc::new(RefCell::new(ConversationPanel::new(identity.clone(), ctx.client.admin_username()))),
        screen: ChatScreen { sidebar: sidebar.clone(), chat: chat.clone(), overlay: overlay.clone() },
    };
    {
        let messages = messages.clone();
        sidebar.connect_activated(move |conv| messages.open(&conv));
    }
    {
        let widgets: Vec<gtk::Widget> = vec![
            refresh_btn.clone().upcast(),
            admin_btn.clone().upcast(),
            chat.close_btn.clone().upcast(),
            chat.send_btn.clone().upcast(),
            chat.entry.clone().upcast(),
        ];
        let messages = messages.clone();
        bind(&widgets, conversation::BINDINGS, Rc::new(move |action: ConversationAction| messages.handle(action)));
    }

    let sessions = Sessions {
        client: ctx.client.clone(),
        list: Rc::new(RefCell::new(SessionsList::new(identity.clone()))),
        pane: sessions_pane,
    };

    let profiles = Profiles {
        client: ctx.client.clone(),
        panel: Rc::new(RefCell::new(ProfilePanel::new(identity.clone()))),
        pane: profile_pane,
    };

    if identity.role == Role::Student {
        let messages = messages.clone();
        let client = ctx.client.clone();
        let parent = window.clone();
        find_btn.connect_clicked(move |_| {
            let messages = messages.clone();
            show_directory_dialog(&client, &parent, move |professional| messages.start(professional));
        });

        let sessions = sessions.clone();
        let profiles = profiles.clone();
        let overlay = overlay.clone();
        let booking = BookingController::new(ctx.client.clone(), identity.clone(), &window, move |booked| {
            toast(
                &overlay,
                &format!("Session booked with {} on {} at {}", booked.professional_name, booked.date_label, booked.time),
            );
            sessions.load();
            profiles.load();
        });
        booking.bind(&book_btn);
    }

    {
        let ctx = ctx.clone();
        let window = window.clone();
        logout_btn.connect_clicked(move |_| {
            let result = ctx.session.borrow_mut().logout();
            if let Err(e) = result {
                warn!("logout did not clear stored identity: {e}");
            }
            crate::ui::login::show_login_window(&ctx);
            window.close();
        });
    }

    messages.refresh();
    if identity.role != Role::Admin {
        sessions.load();
        profiles.load();
    }
}
