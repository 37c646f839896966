//! 身份轮换
//!
//! 纯粹的取值器：从配置的候选池中随机组合出一个新身份，不关心何时轮换。

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::models::{Identity, Viewport};

/// 新身份与当前身份相同时的重抽次数
const MAX_REDRAWS: usize = 8;

/// 客户端画像：UA 与平台需要成对出现
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub user_agent: String,
    pub platform: String,
}

/// 身份候选池
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPool {
    pub profiles: Vec<ClientProfile>,
    pub locales: Vec<String>,
    pub viewports: Vec<Viewport>,
}

impl IdentityPool {
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty() || self.locales.is_empty() || self.viewports.is_empty()
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        let profile = |ua: &str, platform: &str| ClientProfile {
            user_agent: ua.to_string(),
            platform: platform.to_string(),
        };
        Self {
            profiles: vec![
                profile(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                    "Win32",
                ),
                profile(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
                    "Win32",
                ),
                profile(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.2 Safari/605.1.15",
                    "MacIntel",
                ),
                profile(
                    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                    "Linux x86_64",
                ),
            ],
            locales: vec!["ja-JP".to_string(), "ja".to_string()],
            viewports: vec![
                Viewport {
                    width: 1366,
                    height: 768,
                },
                Viewport {
                    width: 1440,
                    height: 900,
                },
                Viewport {
                    width: 1920,
                    height: 1080,
                },
            ],
        }
    }
}

pub struct FingerprintRotator {
    pool: IdentityPool,
}

impl FingerprintRotator {
    /// 候选池为空时退回默认池
    pub fn new(pool: IdentityPool) -> Self {
        let pool = if pool.is_empty() {
            IdentityPool::default()
        } else {
            pool
        };
        Self { pool }
    }

    /// 生成新身份，候选足够时保证与当前身份不同
    pub fn next_identity(&self, current: Option<&Identity>) -> Identity {
        let mut candidate = self.draw();
        for _ in 0..MAX_REDRAWS {
            if current != Some(&candidate) {
                break;
            }
            candidate = self.draw();
        }
        candidate
    }

    fn draw(&self) -> Identity {
        let mut rng = rand::thread_rng();
        let profile = self.pool.profiles.choose(&mut rng);
        Identity {
            user_agent: profile.map(|p| p.user_agent.clone()).unwrap_or_default(),
            platform: profile.map(|p| p.platform.clone()).unwrap_or_default(),
            locale: self.pool.locales.choose(&mut rng).cloned().unwrap_or_default(),
            viewport: self.pool.viewports.choose(&mut rng).copied().unwrap_or(Viewport {
                width: 1366,
                height: 768,
            }),
        }
    }
}

impl Default for FingerprintRotator {
    fn default() -> Self {
        Self::new(IdentityPool::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_values_come_from_the_pool() {
        let pool = IdentityPool::default();
        let rotator = FingerprintRotator::new(pool.clone());
        let identity = rotator.next_identity(None);

        assert!(pool
            .profiles
            .iter()
            .any(|p| p.user_agent == identity.user_agent && p.platform == identity.platform));
        assert!(pool.locales.contains(&identity.locale));
        assert!(pool.viewports.contains(&identity.viewport));
    }

    #[test]
    fn rotation_replaces_current_identity() {
        let rotator = FingerprintRotator::default();
        let mut current = rotator.next_identity(None);
        for _ in 0..50 {
            let next = rotator.next_identity(Some(&current));
            assert_ne!(next, current);
            current = next;
        }
    }

    #[test]
    fn single_candidate_pool_repeats() {
        let pool = IdentityPool {
            profiles: vec![ClientProfile {
                user_agent: "ua".into(),
                platform: "p".into(),
            }],
            locales: vec!["ja-JP".into()],
            viewports: vec![Viewport {
                width: 800,
                height: 600,
            }],
        };
        let rotator = FingerprintRotator::new(pool);
        let first = rotator.next_identity(None);
        assert_eq!(rotator.next_identity(Some(&first)), first);
    }

    #[test]
    fn empty_pool_falls_back_to_defaults() {
        let rotator = FingerprintRotator::new(IdentityPool {
            profiles: vec![],
            locales: vec![],
            viewports: vec![],
        });
        assert!(!rotator.next_identity(None).user_agent.is_empty());
    }
}
