pub mod auth;
pub mod canvas;
pub mod middleware;
pub mod pages;
pub mod state;

// Re-export the pieces the server binary wires together.
pub use middleware::require_auth;
pub use pages::{delete_page_handler, export_page_html_handler, list_pages_handler, ApiDoc};
