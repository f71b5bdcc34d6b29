pub mod booking_dialog;
pub mod chat_view;
pub mod directory_dialog;
pub mod login;
pub mod main_window;
pub mod sidebar;

use std::cell::RefCell;
use std::rc::Rc;

use adw::Application;
use adw::prelude::*;
use gtk4 as gtk;
use log::{error, warn};

use crate::api::client::ApiClient;
use crate::app::AppConfig;
use crate::session::SessionState;
use crate::storage::{MemoryStore, SqliteStore};

pub type Session = SessionState<SqliteStore, MemoryStore>;

/// What every window needs: the application, the backend and the two stores.
#[derive(Clone)]
pub struct AppContext {
    pub app: Application,
    pub client: ApiClient,
    pub session: Rc<RefCell<Session>>,
}

pub fn build_ui(app: &Application) {
    let config = AppConfig::load();
    let client = match ApiClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("invalid server URL {:?}: {e}; using the default", config.base_url);
            match ApiClient::new(&AppConfig::default()) {
                Ok(client) => client,
                Err(e) => {
                    error!("cannot build API client: {e}");
                    return;
                }
            }
        }
    };

    let durable = match SqliteStore::open_default() {
        Ok(store) => store,
        Err(e) => {
            warn!("durable store unavailable ({e}); sign-in will not survive a restart");
            match SqliteStore::in_memory() {
                Ok(store) => store,
                Err(e) => {
                    error!("cannot open any store: {e}");
                    return;
                }
            }
        }
    };

    let ctx = AppContext {
        app: app.clone(),
        client,
        session: Rc::new(RefCell::new(SessionState::new(durable, MemoryStore::new()))),
    };

    let identity = ctx.session.borrow().identity();
    match identity {
        Ok(Some(identity)) => main_window::show_main_window(&ctx, identity),
        Ok(None) => login::show_login_window(&ctx),
        Err(e) => {
            warn!("could not read stored identity: {e}");
            login::show_login_window(&ctx);
        }
    }
}

/// Wires each widget whose name appears in `bindings` to `handler`.
/// Buttons fire on click, entries on Enter.
pub(crate) fn bind<A: Copy + 'static>(
    widgets: &[gtk::Widget],
    bindings: &[(&str, A)],
    handler: Rc<dyn Fn(A)>,
) {
    for widget in widgets {
        let name = widget.widget_name();
        let Some(&(_, action)) = bindings.iter().find(|(n, _)| name.as_str() == *n) else {
            warn!("widget {name} has no binding");
            continue;
        };
        let handler = handler.clone();
        if let Some(button) = widget.downcast_ref::<gtk::Button>() {
            button.connect_clicked(move |_| handler(action));
        } else if let Some(entry) = widget.downcast_ref::<gtk::Entry>() {
            entry.connect_activate(move |_| handler(action));
        }
    }
}

pub(crate) fn toast(overlay: &adw::ToastOverlay, message: &str) {
    overlay.add_toast(adw::Toast::new(message));
}

pub(crate) fn clear_children(container: &gtk::Box) {
    while let Some(child) = container.first_child() {
        container.remove(&child);
    }
}

pub(crate) fn padded(orientation: gtk::Orientation, spacing: i32, margin: i32) -> gtk::Box {
    let root = gtk::Box::new(orientation, spacing);
    root.set_margin_top(margin);
    root.set_margin_bottom(margin);
    root.set_margin_start(margin);
    root.set_margin_end(margin);
    root
}
