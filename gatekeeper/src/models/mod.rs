pub mod config;
pub mod keyword;
pub mod overrides;
pub mod task;

pub use config::RuntimeSettings;
pub use keyword::{Keyword, KeywordKind};
pub use overrides::Overrides;
pub use task::{Task, TaskStatus};
