mod auth;
mod client;
mod request;
pub mod time;

pub use auth::app_access_token;
pub use client::GraphClient;
pub use request::ConnectionRequest;
pub use time::Window;
