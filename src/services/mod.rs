//! Business logic services

pub mod hierarchy_seed;
pub mod tenant_directory;

pub use hierarchy_seed::{seed_hierarchy, SeedReport};
pub use tenant_directory::TenantDirectory;
