use std::cell::RefCell;
use std::rc::Rc;

use adw::prelude::*;
use gtk4 as gtk;

use crate::api::Backend;
use crate::api::client::ApiClient;
use crate::api::models::Professional;
use crate::panels::directory::{Directory, DirectoryView, NO_PROFESSIONALS};
use crate::ui::{clear_children, padded};
use crate::utils::run_async_to_main;

type PickSink = Rc<dyn Fn(Professional)>;

/// Professional search with a "Send message" button per row.
#[derive(Clone)]
struct DirectoryList {
    list: gtk::Box,
    empty: gtk::Label,
    on_pick: PickSink,
}

impl DirectoryView for DirectoryList {
    fn render_directory(&mut self, professionals: &[Professional]) {
        clear_children(&self.list);
        self.empty.set_visible(false);
        for professional in professionals {
            let row = gtk::Box::new(gtk::Orientation::Horizontal, 12);
            row.add_css_class("card");

            let text = padded(gtk::Orientation::Vertical, 2, 8);
            text.set_hexpand(true);
            let name = gtk::Label::new(Some(&professional.name));
            name.set_halign(gtk::Align::Start);
            let category = gtk::Label::new(Some(&professional.category));
            category.add_css_class("dim-label");
            category.add_css_class("caption");
            category.set_halign(gtk::Align::Start);
            text.append(&name);
            text.append(&category);

            let send = gtk::Button::with_label("Send message");
            send.set_valign(gtk::Align::Center);
            send.set_margin_end(8);
            let on_pick = self.on_pick.clone();
            let picked = professional.clone();
            send.connect_clicked(move |_| on_pick(picked.clone()));

            row.append(&text);
            row.append(&send);
            self.list.append(&row);
        }
    }

    fn render_no_professionals(&mut self, error: Option<&str>) {
        clear_children(&self.list);
        self.empty.set_label(error.unwrap_or(NO_PROFESSIONALS));
        self.empty.set_visible(true);
    }
}

/// Opens the directory over `parent`; `on_pick` runs after the dialog closes.
pub fn show_directory_dialog(
    client: &ApiClient,
    parent: &impl IsA<gtk::Window>,
    on_pick: impl Fn(Professional) + 'static,
) {
    let content = padded(gtk::Orientation::Vertical, 12, 12);
    let info = gtk::Label::new(Some("Search by name or category:"));
    info.set_halign(gtk::Align::Start);
    content.append(&info);

    let search = gtk::SearchEntry::new();
    search.set_hexpand(true);
    content.append(&search);

    let empty = gtk::Label::new(Some(NO_PROFESSIONALS));
    empty.add_css_class("dim-label");
    empty.set_visible(false);
    content.append(&empty);

    let list = gtk::Box::new(gtk::Orientation::Vertical, 6);
    let scroller = gtk::ScrolledWindow::builder()
        .min_content_height(320)
        .vexpand(true)
        .child(&list)
        .build();
    content.append(&scroller);

    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    container.append(&adw::HeaderBar::new());
    container.append(&content);

    let window = adw::Window::builder()
        .title("Find a professional")
        .transient_for(parent)
        .modal(true)
        .default_width(420)
        .content(&container)
        .build();

    let on_pick: PickSink = {
        let window = window.clone();
        Rc::new(move |professional| {
            window.close();
            on_pick(professional);
        })
    };
    let view = DirectoryList { list, empty, on_pick };
    let directory = Rc::new(RefCell::new(Directory::new()));

    {
        let directory = directory.clone();
        let view = view.clone();
        search.connect_search_changed(move |entry| {
            let mut view = view.clone();
            directory.borrow_mut().set_query(&entry.text(), &mut view);
        });
    }

    let token = directory.borrow_mut().begin_load();
    let client = client.clone();
    run_async_to_main(async move { client.professionals().await }, move |res| {
        let mut view = view.clone();
        directory.borrow_mut().apply(token, res, &mut view);
    });

    window.present();
}
