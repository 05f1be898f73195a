//! HTTP API handlers for picsong-gen

pub mod files;
pub mod generate;
pub mod health;
pub mod ui;

pub use files::file_routes;
pub use generate::generate_routes;
pub use health::health_routes;
pub use ui::ui_routes;
