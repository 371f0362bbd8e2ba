//! Планировщик таймеров на основе Tokio
//!
//! Каждый таймер - отдельная задача, которая спит заданное время и
//! отправляет `TimerFired` в канал. Хост читает канал и передаёт
//! идентификатор в `PlaybackController::on_boundary_reached`.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use super::ports::{BoundaryKind, Scheduler, TimerHandle};

/// Сообщение о сработавшем таймере
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub handle: TimerHandle,
    pub kind: BoundaryKind,
}

/// Планировщик, использующий `tokio::time::sleep`
///
/// Должен использоваться внутри рантайма Tokio.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
    next_id: u64,
}

impl TokioScheduler {
    /// Создать планировщик и приёмник срабатываний
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tx,
            tasks: HashMap::new(),
            next_id: 0,
        };
        (scheduler, rx)
    }

    /// Количество незавершённых задач таймеров
    pub fn outstanding(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }

    fn prune_finished(&mut self) {
        self.tasks.retain(|_, task| !task.is_finished());
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&mut self, delay: Duration, kind: BoundaryKind) -> TimerHandle {
        self.prune_finished();

        let handle = TimerHandle(self.next_id);
        self.next_id += 1;

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(TimerFired { handle, kind }).is_err() {
                log::debug!("Timer {:?} fired after the receiver was dropped", handle);
            }
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_fires() {
        let (mut scheduler, mut rx) = TokioScheduler::new();
        let handle = scheduler.schedule_after(Duration::from_millis(10), BoundaryKind::Advance);

        let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired, TimerFired { handle, kind: BoundaryKind::Advance });
    }

    #[tokio::test]
    async fn test_cancelled_timer_does_not_fire() {
        let (mut scheduler, mut rx) = TokioScheduler::new();
        let cancelled = scheduler.schedule_after(Duration::from_millis(10), BoundaryKind::Loop);
        scheduler.cancel(cancelled);
        // Повторная отмена допустима
        scheduler.cancel(cancelled);

        let kept = scheduler.schedule_after(Duration::from_millis(40), BoundaryKind::Advance);
        assert_ne!(cancelled, kept);

        let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.handle, kept);
        assert!(rx.try_recv().is_err());
    }
}
