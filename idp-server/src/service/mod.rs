//! Service Module
//!
//! Business logic layer. Services drive the remote APIs through the client
//! traits and own every provisioning rule; the HTTP layer only binds requests.

pub mod account;
pub mod workload;

pub use account::AccountService;
pub use workload::{ProvisioningSettings, WorkloadError, WorkloadService};
