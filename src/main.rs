use adw::Application;
use adw::prelude::*;

fn main() {
    tracing_subscriber::fmt::init();

    let app = Application::builder()
        .application_id("org.betterspace.Client")
        .build();
    app.connect_activate(|app| {
        betterspace_client::ui::build_ui(app);
    });
    app.run();
}
