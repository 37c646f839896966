//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次调度和任务状态机，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor::Orchestrator (处理 Vec<Keyword>)
//!     ↓
//! workflow::QueryFunnel (处理单个 Keyword)
//!     ↓
//! services (能力层：延迟 / 封锁检测 / 恢复 / 账本)
//!     ↓
//! infrastructure (基础设施：KvStore / EventBus)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单线程**：同一时刻只处理一个关键词
//! 2. **唯一写入者**：只有编排层写账本和批次游标
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod batch_processor;

pub use batch_processor::{JobFailure, JobOutcome, Orchestrator};
