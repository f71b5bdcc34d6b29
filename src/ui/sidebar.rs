use std::cell::RefCell;
use std::rc::Rc;

use gtk4 as gtk;
use gtk4::prelude::*;

use crate::api::models::{Channel, Conversation};
use crate::format;
use crate::panels::conversation::NO_CONVERSATIONS;

#[derive(Clone)]
pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    empty: gtk::Label,
    items: Rc<RefCell<Vec<Conversation>>>,
}

impl Sidebar {
    pub fn new() -> Self {
        let root = crate::ui::padded(gtk::Orientation::Vertical, 6, 8);
        root.set_width_request(260);

        let title = gtk::Label::new(Some("Conversations"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let empty = gtk::Label::new(Some(NO_CONVERSATIONS));
        empty.add_css_class("dim-label");
        empty.set_wrap(true);
        empty.set_visible(false);
        root.append(&empty);

        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let scroller = gtk::ScrolledWindow::builder().vexpand(true).child(&list).build();
        root.append(&scroller);

        Self { root, list, empty, items: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// Calls `f` with the conversation whose row was activated.
    pub fn connect_activated<F: Fn(Conversation) + 'static>(&self, f: F) {
        let items = self.items.clone();
        self.list.connect_row_activated(move |_, row| {
            let picked = usize::try_from(row.index())
                .ok()
                .and_then(|i| items.borrow().get(i).cloned());
            if let Some(conversation) = picked {
                f(conversation);
            }
        });
    }

    fn clear(&self) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
    }

    pub fn set_items(&self, items: &[Conversation]) {
        self.clear();
        self.empty.set_visible(false);
        for conv in items {
            let row = gtk::ListBoxRow::new();
            let column = crate::ui::padded(gtk::Orientation::Vertical, 2, 8);

            let name = match conv.channel {
                Channel::Admin => format!("{} · {}", conv.peer_name, conv.peer.role.label()),
                Channel::Peer => conv.peer_name.clone(),
            };
            let label = gtk::Label::new(Some(&name));
            label.set_halign(gtk::Align::Start);
            column.append(&label);

            if let Some(when) = conv.last_message_time.as_ref().and_then(format::format_date_time_label) {
                let time = gtk::Label::new(Some(&when));
                time.add_css_class("dim-label");
                time.add_css_class("caption");
                time.set_halign(gtk::Align::Start);
                column.append(&time);
            }
            row.set_child(Some(&column));
            self.list.append(&row);
        }
        self.items.replace(items.to_vec());
    }

    pub fn set_empty(&self, error: Option<&str>) {
        self.clear();
        self.items.borrow_mut().clear();
        self.empty.set_label(error.unwrap_or(NO_CONVERSATIONS));
        self.empty.set_visible(true);
    }
}
