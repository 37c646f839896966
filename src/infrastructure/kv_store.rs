//! 持久化存储 - 基础设施层
//!
//! 只暴露 get / set / remove 三种能力；账本、批次状态、封锁统计和当前身份都存放在这里。

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 键值存储
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    async fn set(&self, key: &str, value: JsonValue) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// 读取并反序列化
pub async fn get_as<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(value) => {
            let typed = serde_json::from_value(value)
                .with_context(|| format!("存储中的 {} 格式不正确", key))?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

/// 序列化并写入
pub async fn set_as<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_value(value).with_context(|| format!("无法序列化 {}", key))?;
    store.set(key, json).await
}

/// 内存存储（测试、或关闭进度持久化时使用）
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: JsonValue) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// JSON 文件存储
///
/// 每次写入都把完整内容写到临时文件再改名覆盖，进程中途退出时文件要么是旧内容要么是新内容。
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, JsonValue>>,
}

impl JsonFileStore {
    /// 打开（或新建）存储文件
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if fs::try_exists(&path).await.unwrap_or(false) {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("无法读取状态文件: {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("无法解析状态文件: {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        info!("📂 状态文件: {} ({} 项)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, JsonValue>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("无法创建目录: {}", parent.display()))?;
        }

        fs::write(&tmp, content)
            .await
            .with_context(|| format!("无法写入临时文件: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("无法替换状态文件: {}", self.path.display()))?;

        debug!("状态文件已写入: {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: JsonValue) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}
