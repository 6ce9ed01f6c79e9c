pub mod core;
pub mod index_admin;
pub mod ops;
pub mod scan;

pub use self::core::Collection;
pub use scan::{Scan, Snapshot};
