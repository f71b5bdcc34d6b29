pub mod api;
pub mod app;
pub mod error;
pub mod format;
pub mod panels;
pub mod session;
pub mod storage;
pub mod utils;

#[cfg(feature = "gui")]
pub mod ui;

#[cfg(test)]
mod testing;
