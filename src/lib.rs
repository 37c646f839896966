//! # Keyword Funnel
//!
//! 批量关键词分析任务引擎：多阶段查询、提前跳过、封锁检测与恢复、断点续跑
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持久化与通知能力
//! - `KvStore` - 键值存储（内存 / JSON 文件）
//! - `EventBus` - 单向事件广播
//! - `browser/` - 基于 chromiumoxide 的页面抓取实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，互不依赖流程
//! - `delay` / `fingerprint` - 随机等待、身份轮换
//! - `block_detector` - 多信号封锁判定
//! - `recovery` - 封锁恢复策略
//! - `ledger` / `batch_planner` - 进度账本、批次规划
//! - `alert` / `export` - webhook 告警、TSV 导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个关键词"的完整处理流程
//! - `ItemCtx` - 上下文封装（批次 + 位置 + 尝试次数）
//! - `QueryFunnel` - 三阶段查询（窄匹配 → 标题匹配 → 普通）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 状态机、重试上限、批次游标
//!
//! ## 模块结构

pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{JobError, JobResult};
pub use infrastructure::{EventBus, JobEvent, JsonFileStore, KvStore, MemoryStore};
pub use models::{Keyword, ResultRecord};
pub use orchestrator::{JobFailure, JobOutcome, Orchestrator};
pub use services::PageFetcher;
pub use workflow::{ItemCtx, QueryFunnel};
