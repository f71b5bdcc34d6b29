#[cfg(feature = "gui")]
pub use runtime::*;

/// Adds a scheme when the user typed a bare host. Local development servers
/// speak plain HTTP, everything else is assumed to be behind TLS.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if is_local_host(trimmed) {
        format!("http://{}", trimmed)
    } else {
        format!("https://{}", trimmed)
    }
}

fn is_local_host(host: &str) -> bool {
    let name = host.split([':', '/']).next().unwrap_or_default();
    matches!(name, "localhost" | "127.0.0.1" | "0.0.0.0")
}

#[cfg(feature = "gui")]
mod runtime {
    use once_cell::sync::Lazy;

    pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to build Tokio runtime")
    });

    /// Runs `fut` on the shared runtime and hands its output to `on_done` on
    /// the GTK main loop. Panels guard `on_done` with their request token.
    pub fn run_async_to_main<T, Fut, F>(fut: Fut, on_done: F)
    where
        T: Send + 'static,
        Fut: std::future::Future<Output = T> + Send + 'static,
        F: FnOnce(T) + 'static,
    {
        let handle = RUNTIME.spawn(fut);
        glib::MainContext::default().spawn_local(async move {
            match handle.await {
                Ok(out) => on_done(out),
                Err(e) => log::error!("background task failed: {e}"),
            }
        });
    }
}
