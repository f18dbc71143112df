pub mod diff;
pub mod page;
pub mod recent;
pub mod revision;
