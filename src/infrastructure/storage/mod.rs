pub mod leases;
pub mod local;

pub use leases::{DownloadGate, DownloadLease};
pub use local::LocalStorage;
