//! 采集进度通道
//!
//! 每个任务ID一个广播通道，供长连接推送（例如 SSE）订阅。
//! 同一任务可能有多次执行同时进行（手动触发与定时触发重叠），通道按进行中的
//! 执行计数，最后一次执行结束后才关闭，订阅方读完剩余事件后收到 `Closed`。

use std::collections::HashMap;

use crawler_core::models::CrawlEvent;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

struct TaskChannel {
    sender: broadcast::Sender<CrawlEvent>,
    active_runs: usize,
}

pub struct ProgressHub {
    channels: RwLock<HashMap<i64, TaskChannel>>,
    capacity: usize,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn new_channel(&self) -> TaskChannel {
        TaskChannel {
            sender: broadcast::channel(self.capacity).0,
            active_runs: 0,
        }
    }

    /// 订阅任务的进度，通道不存在时创建
    pub async fn subscribe(&self, task_id: i64) -> broadcast::Receiver<CrawlEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(task_id)
            .or_insert_with(|| self.new_channel())
            .sender
            .subscribe()
    }

    /// 登记一次开始的执行
    pub async fn begin_run(&self, task_id: i64) {
        let mut channels = self.channels.write().await;
        channels
            .entry(task_id)
            .or_insert_with(|| self.new_channel())
            .active_runs += 1;
    }

    /// 结束一次执行；没有进行中的执行时关闭通道
    pub async fn end_run(&self, task_id: i64) {
        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(&task_id) else {
            return;
        };
        channel.active_runs = channel.active_runs.saturating_sub(1);
        if channel.active_runs == 0 {
            channels.remove(&task_id);
        }
    }

    /// 发布事件；没有订阅方时直接丢弃
    ///
    /// 终止事件发出后结束对应的一次执行。
    pub async fn publish(&self, event: CrawlEvent) {
        let task_id = event.task_id();
        let terminal = matches!(event, CrawlEvent::Complete { .. });

        if let Some(channel) = self.channels.read().await.get(&task_id) {
            if channel.sender.send(event).is_err() {
                debug!(task.id = task_id, "进度事件没有订阅方");
            }
        }
        if terminal {
            self.end_run(task_id).await;
        }
    }

    pub async fn has_subscribers(&self, task_id: i64) -> bool {
        self.channels
            .read()
            .await
            .get(&task_id)
            .is_some_and(|channel| channel.sender.receiver_count() > 0)
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(64)
    }
}
