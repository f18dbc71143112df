//! Query functions, one zero-sized repo per table.
//!
//! Every function takes any `PgExecutor`, so it runs equally against the pool
//! or inside a transaction.

pub mod page_repo;
pub mod revision_repo;

pub use page_repo::PageRepo;
pub use revision_repo::RevisionRepo;
