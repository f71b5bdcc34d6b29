use std::rc::Rc;

use adw::prelude::*;
use gtk4 as gtk;
use log::{info, warn};

use crate::api::Backend;
use crate::api::client::ApiClient;
use crate::app::AppConfig;
use crate::session::{confirm_otp, landing_page, validate_credentials, validate_otp, OTP_LEN};
use crate::ui::{AppContext, padded, toast};

pub fn show_login_window(ctx: &AppContext) {
    let window = adw::ApplicationWindow::builder()
        .application(&ctx.app)
        .title("BetterSpace")
        .default_width(420)
        .default_height(320)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();
    let stack = gtk::Stack::new();
    stack.set_transition_type(gtk::StackTransitionType::SlideLeftRight);

    // Sign-in page
    let login_page = padded(gtk::Orientation::Vertical, 12, 24);
    let title = gtk::Label::new(Some("Sign in to BetterSpace"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    login_page.append(&title);

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("Server URL (e.g. http://localhost:8000)"));
    server_entry.set_text(&AppConfig::load().base_url);
    let email_entry = gtk::Entry::new();
    email_entry.set_placeholder_text(Some("Email"));
    email_entry.set_input_purpose(gtk::InputPurpose::Email);
    let pass_entry = gtk::PasswordEntry::new();
    pass_entry.set_placeholder_text(Some("Password"));
    pass_entry.set_show_peek_icon(true);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&server_entry);
    form.append(&email_entry);
    form.append(&pass_entry);
    login_page.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    login_page.append(&status);

    let login_btn = gtk::Button::with_label("Sign in");
    login_btn.add_css_class("suggested-action");
    login_btn.set_halign(gtk::Align::End);
    login_page.append(&login_btn);

    // Verification page
    let otp_page = padded(gtk::Orientation::Vertical, 12, 24);
    let otp_title = gtk::Label::new(Some("Check your email"));
    otp_title.add_css_class("title-2");
    otp_title.set_halign(gtk::Align::Start);
    otp_page.append(&otp_title);
    let otp_hint = gtk::Label::new(Some("Enter the 6-digit verification code we sent you."));
    otp_hint.set_halign(gtk::Align::Start);
    otp_hint.set_wrap(true);
    otp_page.append(&otp_hint);

    let otp_entry = gtk::Entry::new();
    otp_entry.set_max_length(OTP_LEN as i32);
    otp_entry.set_input_purpose(gtk::InputPurpose::Digits);
    otp_entry.set_placeholder_text(Some("000000"));
    otp_page.append(&otp_entry);

    let otp_buttons = gtk::Box::new(gtk::Orientation::Horizontal, 8);
    otp_buttons.set_halign(gtk::Align::End);
    let back_btn = gtk::Button::with_label("Back");
    let verify_btn = gtk::Button::with_label("Verify");
    verify_btn.add_css_class("suggested-action");
    otp_buttons.append(&back_btn);
    otp_buttons.append(&verify_btn);
    otp_page.append(&otp_buttons);

    stack.add_named(&login_page, Some("login"));
    stack.add_named(&otp_page, Some("otp"));
    toast_overlay.set_child(Some(&stack));

    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    header.set_title_widget(Some(&gtk::Label::new(Some("BetterSpace"))));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    // The client the verification step uses, replaced when the URL changes.
    let client = Rc::new(std::cell::RefCell::new(ctx.client.clone()));

    let on_login: Rc<dyn Fn()> = {
        let ctx = ctx.clone();
        let client = client.clone();
        let overlay = toast_overlay.clone();
        let stack = stack.clone();
        let status = status.clone();
        let login_btn = login_btn.clone();
        let server_entry = server_entry.clone();
        let email_entry = email_entry.clone();
        let pass_entry = pass_entry.clone();
        let otp_entry = otp_entry.clone();
        Rc::new(move || {
            let email = email_entry.text().to_string();
            let password = pass_entry.text().to_string();
            if let Err(e) = validate_credentials(&email, &password) {
                toast(&overlay, &e.to_string());
                return;
            }
            let config = AppConfig::load().with_url_override(Some(server_entry.text().to_string()));
            let api = match ApiClient::new(&config) {
                Ok(api) => api,
                Err(e) => {
                    toast(&overlay, &e.user_message());
                    return;
                }
            };
            if let Err(e) = config.save() {
                warn!("could not save settings: {e}");
            }
            client.replace(api.clone());

            status.set_label("Signing in…");
            login_btn.set_sensitive(false);

            let ctx = ctx.clone();
            let overlay = overlay.clone();
            let stack = stack.clone();
            let status = status.clone();
            let login_btn = login_btn.clone();
            let otp_entry = otp_entry.clone();
            crate::utils::run_async_to_main(
                async move { api.login(email.trim(), &password).await },
                move |res| {
                    login_btn.set_sensitive(true);
                    status.set_label("");
                    match res {
                        Ok(pending) => {
                            if let Err(e) = ctx.session.borrow_mut().record_pending(&pending) {
                                toast(&overlay, &e.user_message());
                                return;
                            }
                            otp_entry.set_text("");
                            stack.set_visible_child_name("otp");
                            otp_entry.grab_focus();
                        }
                        Err(e) => toast(&overlay, &e.user_message()),
                    }
                },
            );
        })
    };

    let on_verify: Rc<dyn Fn()> = {
        let ctx = ctx.clone();
        let client = client.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let stack = stack.clone();
        let otp_entry = otp_entry.clone();
        let verify_btn = verify_btn.clone();
        Rc::new(move || {
            let code = match validate_otp(&otp_entry.text()) {
                Ok(code) => code,
                Err(e) => {
                    toast(&overlay, &e.to_string());
                    return;
                }
            };
            let pending = match ctx.session.borrow().pending() {
                Ok(Some(pending)) => pending,
                _ => {
                    toast(&overlay, "Session expired. Please sign in again.");
                    stack.set_visible_child_name("login");
                    return;
                }
            };
            verify_btn.set_sensitive(false);

            let api = client.borrow().clone();
            let ctx = ctx.clone();
            let window = window.clone();
            let overlay = overlay.clone();
            let otp_entry = otp_entry.clone();
            let verify_btn = verify_btn.clone();
            crate::utils::run_async_to_main(
                async move { confirm_otp(&api, &pending, &code).await.map(|identity| (api, identity)) },
                move |res| {
                    verify_btn.set_sensitive(true);
                    match res {
                        Ok((api, identity)) => {
                            if let Err(e) = ctx.session.borrow_mut().complete_verification(&identity) {
                                toast(&overlay, &e.user_message());
                                return;
                            }
                            info!("verified; landing on {}", landing_page(identity.role));
                            let ctx = AppContext { client: api, ..ctx.clone() };
                            crate::ui::main_window::show_main_window(&ctx, identity);
                            window.close();
                        }
                        Err(e) => {
                            otp_entry.set_text("");
                            toast(&overlay, &e.user_message());
                        }
                    }
                },
            );
        })
    };

    {
        let on_login = on_login.clone();
        login_btn.connect_clicked(move |_| (on_login)());
    }
    {
        let on_login = on_login.clone();
        email_entry.connect_activate(move |_| (on_login)());
    }
    {
        let on_login = on_login.clone();
        pass_entry.connect_activate(move |_| (on_login)());
    }
    {
        let on_verify = on_verify.clone();
        verify_btn.connect_clicked(move |_| (on_verify)());
    }
    {
        let on_verify = on_verify.clone();
        otp_entry.connect_activate(move |_| (on_verify)());
    }
    {
        let stack = stack.clone();
        back_btn.connect_clicked(move |_| stack.set_visible_child_name("login"));
    }

    window.present();
}
