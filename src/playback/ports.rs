//! Внешние зависимости контроллера воспроизведения
//!
//! Медиаплеер и планировщик таймеров подставляются снаружи,
//! поэтому логику контроллера можно тестировать без реального аудио.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::MediaError;

/// Медиаплеер, воспроизводящий аудио урока
pub trait MediaPlayer {
    /// Текущая позиция (секунды)
    fn position(&self) -> f64;

    /// Перейти к позиции (секунды)
    fn set_position(&mut self, position: f64);

    /// Длительность, если она уже известна
    fn duration(&self) -> Option<f64>;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64);

    fn is_paused(&self) -> bool;

    /// Лежит ли позиция в доступном для перемотки диапазоне
    fn can_seek_to(&self, position: f64) -> bool;

    /// Начать воспроизведение; может быть отклонено
    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);
}

/// Назначение запланированного таймера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Переход к следующему предложению
    Advance,
    /// Повтор текущего предложения
    Loop,
}

/// Идентификатор запланированного таймера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Планировщик таймеров
///
/// Когда таймер срабатывает, хост вызывает
/// `PlaybackController::on_boundary_reached` с его идентификатором.
pub trait Scheduler {
    /// Запланировать срабатывание через `delay`
    fn schedule_after(&mut self, delay: Duration, kind: BoundaryKind) -> TimerHandle;

    /// Отменить таймер; повторная отмена допустима
    fn cancel(&mut self, handle: TimerHandle);
}
