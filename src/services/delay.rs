//! 随机等待时长
//!
//! 采样以区间中点为均值的截断正态分布（区间外的样本重新采样），
//! 避免均匀分布那种平坦的时间特征。

use std::f64::consts::PI;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

/// 超过该次数仍落在区间外时直接取中点
const MAX_RESAMPLES: usize = 32;

/// 区间宽度约等于 6 个标准差
const SIGMAS_PER_RANGE: f64 = 6.0;

/// 等待区间（毫秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self::from_millis(min * 1000, max * 1000)
    }

    pub const ZERO: DelayRange = DelayRange::from_millis(0, 0);

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    pub fn sample(&self) -> Duration {
        delay(self.min(), self.max())
    }
}

/// 在 `[min, max]` 内采样一个等待时长
pub fn delay(min: Duration, max: Duration) -> Duration {
    sample_with(&mut rand::thread_rng(), min, max)
}

/// 使用指定随机源采样
pub fn sample_with<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }

    let lo = min.as_secs_f64();
    let hi = max.as_secs_f64();
    let mean = (lo + hi) / 2.0;
    let std_dev = (hi - lo) / SIGMAS_PER_RANGE;

    for _ in 0..MAX_RESAMPLES {
        let x = mean + std_dev * standard_normal(rng);
        if (lo..=hi).contains(&x) {
            return Duration::from_secs_f64(x).clamp(min, max);
        }
    }

    Duration::from_secs_f64(mean).clamp(min, max)
}

/// Box-Muller 变换
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// 倒计时等待，每隔 `tick` 回调一次剩余时间
pub async fn countdown<F>(total: Duration, tick: Duration, mut on_tick: F)
where
    F: FnMut(Duration),
{
    let tick = if tick.is_zero() { total } else { tick };
    let mut remaining = total;

    while !remaining.is_zero() {
        on_tick(remaining);
        let step = remaining.min(tick);
        sleep(step).await;
        remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_stay_within_bounds_and_cluster_at_midpoint() {
        let mut rng = StdRng::seed_from_u64(7);
        let min = Duration::from_millis(5_000);
        let max = Duration::from_millis(10_000);
        let samples: Vec<f64> = (0..10_000)
            .map(|_| sample_with(&mut rng, min, max))
            .inspect(|d| assert!(*d >= min && *d <= max, "{:?} 超出区间", d))
            .map(|d| d.as_secs_f64())
            .collect();

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - 7.5).abs() < 0.05, "均值 {} 偏离中点", mean);

        // 中间一半区间：均匀分布约 50%，这里应明显更高
        let central = samples
            .iter()
            .filter(|x| (6.25..=8.75).contains(*x))
            .count() as f64
            / samples.len() as f64;
        assert!(central > 0.75, "中间区间占比 {}", central);

        // 两端各 10% 的尾部密度明显低于均匀分布的 20%
        let tails = samples
            .iter()
            .filter(|x| **x < 5.5 || **x > 9.5)
            .count() as f64
            / samples.len() as f64;
        assert!(tails < 0.1, "尾部占比 {}", tails);
    }

    #[test]
    fn degenerate_range_returns_min() {
        let d = Duration::from_secs(3);
        assert_eq!(delay(d, d), d);
        assert_eq!(delay(d, Duration::from_secs(1)), d);
        assert_eq!(DelayRange::ZERO.sample(), Duration::ZERO);
    }

    #[test]
    fn thread_rng_samples_respect_bounds() {
        let range = DelayRange::from_secs(60, 300);
        for _ in 0..1_000 {
            let d = range.sample();
            assert!(d >= range.min() && d <= range.max());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_until_done() {
        let mut ticks = Vec::new();
        countdown(Duration::from_secs(25), Duration::from_secs(10), |left| {
            ticks.push(left.as_secs())
        })
        .await;
        assert_eq!(ticks, vec![25, 15, 5]);
    }
}
