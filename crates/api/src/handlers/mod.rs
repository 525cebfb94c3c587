pub mod credits;
pub mod files;
pub mod jobs;
pub mod loras;
pub mod media;
pub mod migration;
pub mod models;
pub mod presets;
pub mod settings;
pub mod storage;
pub mod uploads;
pub mod video_projects;
pub mod workspaces;
