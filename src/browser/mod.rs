//! 浏览器抓取实现

pub mod connection;
pub mod page_fetcher;

pub use connection::open_browser;
pub use page_fetcher::BrowserFetcher;
