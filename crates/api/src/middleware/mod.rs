//! Request extractors shared by handlers.
//!
//! - [`user::CurrentUser`] -- the user a request acts on behalf of.

pub mod user;
