pub mod app;
pub mod cli;
pub mod config;
pub mod content;
pub mod post;
pub mod search;
pub mod server;
pub mod session;
pub mod storage;

pub use app::App;
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use content::{ContentItem, ContentList, PostItem};
pub use post::{Post, PostId};
pub use storage::PostRepository;
