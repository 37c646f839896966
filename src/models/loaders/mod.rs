pub mod keyword_loader;

pub use keyword_loader::{load_keywords, parse_keywords};
