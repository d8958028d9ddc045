pub mod config;
pub mod ids;
pub mod instance;
pub mod project;
pub mod template;

pub use config::*;
pub use ids::*;
pub use instance::*;
pub use project::*;
pub use template::*;
