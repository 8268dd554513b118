//! grainscope-io: storage and the sample service.
//!
//! The engine crate is pure; this crate supplies the blob and result
//! stores it reads from and writes to, and [`SampleService`], which
//! runs each operation as a read-modify-write on one sample.

pub mod fs;
pub mod memory;
pub mod service;
pub mod store;

pub use fs::DirectoryStore;
pub use memory::MemoryStore;
pub use service::{SampleService, SampleStatistics, ServiceError, multiphase_preview_name};
pub use store::{BlobStore, ResultStore, SampleId, SampleRecord, StoreError};
