//! Модуль для реализации системы уведомлений
//!
//! Этот модуль предоставляет конкретные реализации наблюдателей
//! для событий плеера.

use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use crate::events::{PlayerEvent, PlayerObserver};

/// Наблюдатель, пишущий события в лог
pub struct LogObserver {
    /// Префикс для вывода (опционально)
    prefix: Option<String>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerObserver for LogObserver {
    fn on_event(&self, event: &PlayerEvent) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        match event {
            PlayerEvent::SessionEnded { duration_secs, sentences_touched, all_sentences_touched } => {
                log::info!(
                    "{}Session ended after {}s, {} sentences touched (all: {})",
                    prefix, duration_secs, sentences_touched, all_sentences_touched
                );
            }
            other => log::debug!("{}{:?}", prefix, other),
        }
    }
}

/// Наблюдатель, сохраняющий события в памяти
#[derive(Clone, Default)]
pub struct MemoryObserver {
    /// История событий
    history: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю событий
    pub fn history(&self) -> Vec<PlayerEvent> {
        self.history.lock().clone()
    }

    /// Очистить историю событий
    pub fn clear_history(&self) {
        self.history.lock().clear();
    }
}

impl PlayerObserver for MemoryObserver {
    fn on_event(&self, event: &PlayerEvent) {
        self.history.lock().push(event.clone());
    }
}

/// Наблюдатель, отправляющий события через канал
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<PlayerEvent>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self { sender }
    }

    /// Создать наблюдателя вместе с приёмником
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl PlayerObserver for ChannelObserver {
    fn on_event(&self, event: &PlayerEvent) {
        if self.sender.send(event.clone()).is_err() {
            log::debug!("Event receiver dropped, discarding {:?}", event);
        }
    }
}

/// Наблюдатель, вызывающий функцию обратного вызова
pub struct CallbackObserver<F>
where
    F: Fn(&PlayerEvent) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: Fn(&PlayerEvent) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> PlayerObserver for CallbackObserver<F>
where
    F: Fn(&PlayerEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &PlayerEvent) {
        (self.callback)(event);
    }
}

/// Комбинированный наблюдатель, объединяющий несколько наблюдателей
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Box<dyn PlayerObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn PlayerObserver>) {
        self.observers.push(observer);
    }

    /// Удалить всех наблюдателей
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl PlayerObserver for CompositeObserver {
    fn on_event(&self, event: &PlayerEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
