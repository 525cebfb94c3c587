//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod credit;
pub mod job;
pub mod lora;
pub mod preset;
pub mod status;
pub mod user_setting;
pub mod video_project;
pub mod workspace;
