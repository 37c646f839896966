pub mod category;
pub mod identity;
pub mod job_state;
pub mod keyword;
pub mod loaders;
pub mod page;
pub mod record;

pub use category::{Category, CategoryTable, Subcategory};
pub use identity::{Identity, Viewport};
pub use job_state::{BatchState, BlockStats, JobState, ProgressSnapshot};
pub use keyword::Keyword;
pub use loaders::{load_keywords, parse_keywords};
pub use page::{FetchedPage, PageSignals, SearchEntry, SearchQuery, Stage};
pub use record::{CategoryBreakdown, CategoryStats, Metric, ResultRecord};
