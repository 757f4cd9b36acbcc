pub mod blob;
pub mod db;
pub mod worker;

pub use blob::{CloudinaryBlobStore, UnconfiguredBlobStore};
pub use db::DbAdapter;
pub use worker::{HttpWorkerDispatcher, LoggingDispatcher};
