//! # permafrost-aws
//!
//! AWS integrations for permafrost: the S3 object store the archive
//! artifacts live in, SESv2 delivery for success/failure notices, and an
//! in-memory object store for tests.

pub mod memory;
pub mod s3;
pub mod ses;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use ses::SesNotificationChannel;
