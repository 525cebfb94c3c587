//! Domain logic shared by the EnguiStudio backend crates.
//!
//! Nothing in here touches the database or the network; the `db`, `cloud`
//! and `api` crates build on these types and validation helpers.

pub mod credits;
pub mod crypto;
pub mod error;
pub mod ffmpeg;
pub mod media;
pub mod mime;
pub mod models;
pub mod naming;
pub mod preset;
pub mod settings;
pub mod types;
pub mod video_project;
pub mod workspace;
