pub mod config_io;
pub mod fs_store;
pub mod project_io;
pub mod recovery;

pub use fs_store::{FsStore, InstanceStore, MemoryStore, RecoverySink, StoreError, TemplateStore};
