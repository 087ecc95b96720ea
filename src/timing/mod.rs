//! # 计时注册表
//!
//! 以请求标识为键记录起始时刻。条目遵循一次性结算语义：
//! 结算即删除，重复结算得到零时长。终结钩子未被调用的孤儿
//! 条目由后台清理任务按期回收，保证注册表规模有界。

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::logging::{LogComponent, LogStage};
use crate::lwarn;

/// 进行中请求的起始时间表
#[derive(Debug, Default)]
pub struct TimingRegistry {
    started: DashMap<String, Instant>,
}

impl TimingRegistry {
    /// 创建空注册表
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: DashMap::new(),
        }
    }

    /// 记录一次请求的起点；同一标识重复记录时覆盖旧值
    pub fn start(&self, request_id: &str) {
        self.started.insert(request_id.to_string(), Instant::now());
    }

    /// 结算并移除起点，返回经过时长
    ///
    /// 条目缺失（从未记录或已被结算）时返回零时长。
    #[must_use]
    pub fn take_elapsed(&self, request_id: &str) -> Duration {
        self.started
            .remove(request_id)
            .map_or(Duration::ZERO, |(_, started)| started.elapsed())
    }

    /// 当前在途条目数
    #[must_use]
    pub fn len(&self) -> usize {
        self.started.len()
    }

    /// 注册表是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    /// 启动后台清理任务，按期回收超龄条目
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        sweep_interval: Duration,
        stale_after: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(sweep_interval);
            loop {
                timer.tick().await;
                registry.sweep(stale_after);
            }
        })
    }

    fn sweep(&self, stale_after: Duration) {
        let before = self.started.len();
        self.started
            .retain(|_, started| started.elapsed() < stale_after);
        let removed = before.saturating_sub(self.started.len());
        if removed > 0 {
            lwarn!(
                "system",
                LogStage::BackgroundTask,
                LogComponent::Timing,
                "stale_timings_swept",
                "回收孤儿计时条目",
                removed = removed,
                remaining = self.started.len()
            );
        }
    }
}
