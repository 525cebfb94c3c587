//! Provider integrations: RunPod serverless endpoints, S3-compatible
//! object storage, and the local-disk media store.

pub mod runpod;
pub mod s3;
pub mod store;

pub use runpod::{RunPodClient, RunPodError, RunPodOutput, RunPodStatus};
pub use s3::{S3Settings, S3Storage};
pub use store::{LocalStore, MediaStore, StorageError, StoredObject};
