//! Модуль событий плеера
//!
//! Реализация паттерна Observer: контроллер воспроизведения сообщает
//! представлению о смене активного предложения, режимах и завершении сессии.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Событие, которое плеер отправляет наблюдателям
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Активным стало предложение `index`
    SentenceActivated { index: usize },
    /// Предложение открыто в режиме диктанта
    SentenceRevealed { index: usize },
    /// Режим диктанта переключён; набор открытых предложений очищен
    DictationChanged { enabled: bool },
    /// Режим повтора предложения переключён
    LoopChanged { enabled: bool },
    /// Достигнут конец последнего предложения
    #[serde(rename_all = "camelCase")]
    PlaybackFinished { last_index: usize },
    /// Медиа доиграло до конца
    MediaEnded,
    /// Стала известна длительность медиа
    DurationKnown { duration: f64 },
    /// Сессия завершена
    #[serde(rename_all = "camelCase")]
    SessionEnded {
        duration_secs: u64,
        sentences_touched: usize,
        all_sentences_touched: bool,
    },
}

/// Трейт для наблюдателя, получающего события плеера
pub trait PlayerObserver: Send + Sync {
    /// Метод, вызываемый при каждом событии
    fn on_event(&self, event: &PlayerEvent);
}

/// Рассылка событий зарегистрированным наблюдателям
#[derive(Default)]
pub struct EventDispatcher {
    /// Наблюдатели по идентификатору, в порядке регистрации
    observers: BTreeMap<usize, Box<dyn PlayerObserver>>,
    /// Счетчик для генерации идентификаторов
    next_id: usize,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить наблюдателя
    ///
    /// Возвращает идентификатор, по которому наблюдателя можно удалить.
    pub fn add_observer(&mut self, observer: Box<dyn PlayerObserver>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.insert(id, observer);
        id
    }

    /// Удалить наблюдателя по идентификатору
    pub fn remove_observer(&mut self, id: usize) -> Option<Box<dyn PlayerObserver>> {
        self.observers.remove(&id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Уведомить всех наблюдателей
    pub fn notify(&self, event: PlayerEvent) {
        log::trace!("Player event: {:?}", event);
        for observer in self.observers.values() {
            observer.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("observers", &self.observers.len())
            .finish()
    }
}
