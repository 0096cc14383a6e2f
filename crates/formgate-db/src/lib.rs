//! Formgate database layer
//!
//! Catalog lookups against the platform database, the per-tenant connection
//! pool cache, and the form/submission queries that run against whichever
//! pool the pipeline selected (tenant or platform).

pub mod catalog;
pub mod forms;
pub mod metrics;
pub mod orphans;
pub mod pool_cache;
pub mod submissions;

pub use catalog::CatalogRepository;
pub use pool_cache::TenantPoolCache;
