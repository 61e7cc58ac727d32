//! External collaborators of the scheduling core.
//!
//! - [`JobApi`]: submit, poll and download, implemented by [`FireflyClient`]
//! - [`Uploader`]: makes local reference files reachable by the service
//! - [`auth`]: client-credentials token exchange

pub mod api;
pub mod auth;
pub mod firefly;
pub mod types;
pub mod upload;

pub use api::{is_remote_reference, JobApi, Uploader};
pub use auth::Credentials;
pub use firefly::FireflyClient;
pub use types::{JobHandle, JobStatus, SubmitRequest};
pub use upload::{AzureSasUploader, LocalFileUploader};
