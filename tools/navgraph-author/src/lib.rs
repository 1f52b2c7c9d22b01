pub mod authoring;
pub mod commands;
pub mod config;
pub mod store;
pub mod viewer;

pub use authoring::{author_path, ChainMode, Session};
pub use config::Config;
pub use store::RecordStore;
