pub mod devlog;
pub mod logger;
