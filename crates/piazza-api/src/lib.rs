pub mod auth;
pub mod content;
pub mod convert;
pub mod error;
pub mod feed;
pub mod messages;
pub mod middleware;
pub mod state;
