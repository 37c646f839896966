pub mod item_ctx;
pub mod query_funnel;

pub use item_ctx::ItemCtx;
pub use query_funnel::{QueryFunnel, QueryPrefixes, SkipThresholds};
