//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Every user-owned query
//! filters on `user_id` so rows of other users behave as missing.

pub mod credit_repo;
pub mod job_repo;
pub mod lora_repo;
pub mod preset_repo;
pub mod user_setting_repo;
pub mod video_project_repo;
pub mod workspace_media_repo;
pub mod workspace_repo;

pub use credit_repo::CreditRepo;
pub use job_repo::JobRepo;
pub use lora_repo::LoraRepo;
pub use preset_repo::PresetRepo;
pub use user_setting_repo::UserSettingRepo;
pub use video_project_repo::VideoProjectRepo;
pub use workspace_media_repo::WorkspaceMediaRepo;
pub use workspace_repo::WorkspaceRepo;
