pub mod connection;
pub mod headless;

pub use connection::connect_to_browser_and_page;
pub use headless::{PageReady, launch_headless_get_page_browser};
