//! 累计计时器.

use std::time::{Duration, Instant};

/// 可以多次开始/停止并累计时长的计时器.
///
/// 投影器和重建对象各自持有一个, 在最终日志中报告耗时.
#[derive(Clone, Debug)]
pub struct AccTimer {
    consumed: Duration,
    since: Option<Instant>,
}

impl AccTimer {
    /// 初始化计时器, 尚未开始计时.
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: None,
        }
    }

    /// 开始计时. 正在计时时调用无效果.
    #[inline]
    pub fn start(&mut self) {
        if self.since.is_none() {
            self.since = Some(Instant::now());
        }
    }

    /// 停止计时, 并将这一区间的时间累加. 返回本轮计时时长, 未在计时时返回 0.
    #[inline]
    pub fn stop(&mut self) -> Duration {
        match self.since.take() {
            Some(t) => {
                let d = t.elapsed();
                self.consumed += d;
                d
            }
            None => Duration::ZERO,
        }
    }

    /// 清零并停止.
    #[inline]
    pub fn reset(&mut self) {
        self.consumed = Duration::ZERO;
        self.since = None;
    }

    /// 是否正在计时.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.since.is_some()
    }

    /// 累计时长, 包括正在进行的一轮.
    #[inline]
    pub fn total(&self) -> Duration {
        self.consumed + self.since.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// 累计时长 (秒).
    #[inline]
    pub fn value_secs(&self) -> f64 {
        self.total().as_secs_f64()
    }

    /// 累计时长 (毫秒).
    #[inline]
    pub fn get_total_ms(&self) -> u64 {
        self.total().as_millis() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates() {
        let mut t = AccTimer::new();
        assert_eq!(t.stop(), Duration::ZERO);
        t.start();
        assert!(t.is_running());
        std::thread::sleep(Duration::from_millis(2));
        let first = t.stop();
        assert!(first >= Duration::from_millis(2));
        t.start();
        t.stop();
        assert!(t.total() >= first);
        t.reset();
        assert_eq!(t.total(), Duration::ZERO);
    }
}
