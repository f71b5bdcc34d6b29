use gtk4 as gtk;
use gtk4::prelude::*;

use crate::panels::conversation::{NO_MESSAGES, ThreadLine};
use crate::ui::{clear_children, padded};

#[derive(Clone)]
pub struct ChatView {
    root: gtk::Stack,
    title: gtk::Label,
    messages_box: gtk::Box,
    scroller: gtk::ScrolledWindow,
    error: gtk::Label,
    pub entry: gtk::Entry,
    pub send_btn: gtk::Button,
    pub close_btn: gtk::Button,
}

impl ChatView {
    pub fn new() -> Self {
        let root = gtk::Stack::new();

        let placeholder = gtk::Label::new(Some("Select a conversation"));
        placeholder.add_css_class("dim-label");
        root.add_named(&placeholder, Some("empty"));

        let thread = padded(gtk::Orientation::Vertical, 6, 8);
        let top = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let title = gtk::Label::new(None);
        title.add_css_class("heading");
        title.set_hexpand(true);
        title.set_halign(gtk::Align::Start);
        let close_btn = gtk::Button::from_icon_name("window-close-symbolic");
        close_btn.add_css_class("flat");
        close_btn.set_widget_name("chatClose");
        top.append(&title);
        top.append(&close_btn);
        thread.append(&top);

        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .child(&messages_box)
            .build();
        thread.append(&scroller);

        let error = gtk::Label::new(None);
        error.add_css_class("error");
        error.set_halign(gtk::Align::Start);
        error.set_visible(false);
        thread.append(&error);

        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        entry.set_widget_name("chatInput");
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        send_btn.set_widget_name("chatSend");
        input_row.append(&entry);
        input_row.append(&send_btn);
        thread.append(&input_row);

        root.add_named(&thread, Some("thread"));
        root.set_visible_child_name("empty");

        Self { root, title, messages_box, scroller, error, entry, send_btn, close_btn }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn input_text(&self) -> String {
        self.entry.text().to_string()
    }

    pub fn set_sending(&self, sending: bool) {
        self.send_btn.set_sensitive(!sending);
    }

    pub fn open(&self, title: &str) {
        self.title.set_label(title);
        self.hide_error();
        clear_children(&self.messages_box);
        self.root.set_visible_child_name("thread");
    }

    pub fn close(&self) {
        clear_children(&self.messages_box);
        self.hide_error();
        self.root.set_visible_child_name("empty");
    }

    pub fn set_lines(&self, lines: &[ThreadLine]) {
        clear_children(&self.messages_box);
        self.hide_error();
        if lines.is_empty() {
            let empty = gtk::Label::new(Some(NO_MESSAGES));
            empty.add_css_class("dim-label");
            empty.set_vexpand(true);
            self.messages_box.append(&empty);
            return;
        }
        for line in lines {
            self.messages_box.append(&bubble(line));
        }
    }

    pub fn show_thread_error(&self, message: &str) {
        clear_children(&self.messages_box);
        self.show_error(message);
    }

    pub fn show_error(&self, message: &str) {
        self.error.set_label(message);
        self.error.set_visible(true);
    }

    fn hide_error(&self) {
        self.error.set_visible(false);
    }

    pub fn clear_input(&self) {
        self.entry.set_text("");
        self.hide_error();
    }

    /// Waits for the new rows to be laid out before jumping to the bottom.
    pub fn scroll_to_bottom(&self) {
        let adj = self.scroller.vadjustment();
        glib::idle_add_local_once(move || {
            adj.set_value(adj.upper() - adj.page_size());
        });
    }
}

fn bubble(line: &ThreadLine) -> gtk::Widget {
    let column = gtk::Box::new(gtk::Orientation::Vertical, 2);
    column.add_css_class("card");
    column.set_halign(if line.is_self { gtk::Align::End } else { gtk::Align::Start });

    let text = gtk::Label::new(Some(&line.text));
    text.set_wrap(true);
    text.set_selectable(true);
    text.set_xalign(0.0);
    text.set_margin_top(6);
    text.set_margin_start(10);
    text.set_margin_end(10);
    column.append(&text);

    if let Some(time) = &line.time_label {
        let stamp = gtk::Label::new(Some(time));
        stamp.add_css_class("caption");
        stamp.add_css_class("dim-label");
        stamp.set_halign(gtk::Align::End);
        stamp.set_margin_end(10);
        stamp.set_margin_bottom(4);
        column.append(&stamp);
    }
    column.upcast()
}
