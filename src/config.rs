//! Модуль конфигурации библиотеки lesson-sync
//!
//! Этот модуль содержит структуры для настройки воспроизведения
//! и имена ключей, под которыми данные сохраняются в хранилище.

use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Префикс ключей прогресса уроков
pub const PROGRESS_KEY_PREFIX: &str = "nce_progress_";
/// Ключ общей статистики
pub const STATISTICS_KEY: &str = "nce_statistics";
/// Ключ списка избранных предложений
pub const FAVORITES_KEY: &str = "nce_favorites";
/// Ключ словаря
pub const VOCABULARY_KEY: &str = "nce_vocabulary";
/// Ключ скорости воспроизведения
pub const PLAYBACK_SPEED_KEY: &str = "nce_playback_speed";
/// Ключ громкости
pub const AUDIO_VOLUME_KEY: &str = "nce_audio_volume";

/// Длительности, используемые при вычислении границ сегментов
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SegmentSpans {
    /// Длительность предложения, если его конец неизвестен (секунды)
    pub default_span: f64,
    /// Минимальная длительность сегмента (секунды)
    pub min_span: f64,
}

impl Default for SegmentSpans {
    fn default() -> Self {
        Self {
            default_span: 3.0,
            min_span: 0.6,
        }
    }
}

/// Конфигурация плеера
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Длительности сегментов
    pub spans: SegmentSpans,
    /// Доступные скорости воспроизведения, по возрастанию
    pub speed_steps: Vec<f32>,
    /// Скорость по умолчанию
    pub default_speed: f32,
    /// Делить задержку таймера на скорость воспроизведения
    pub scale_timers_by_rate: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spans: SegmentSpans::default(),
            speed_steps: vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0],
            default_speed: 1.0,
            scale_timers_by_rate: true,
        }
    }
}

impl PlayerConfig {
    /// Загрузить конфигурацию из JSON; отсутствующие поля берутся по умолчанию
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Следующая скорость выше `current`
    pub fn next_speed_up(&self, current: f32) -> Option<f32> {
        self.speed_steps
            .iter()
            .copied()
            .find(|step| *step > current + f32::EPSILON)
    }

    /// Следующая скорость ниже `current`
    pub fn next_speed_down(&self, current: f32) -> Option<f32> {
        self.speed_steps
            .iter()
            .rev()
            .copied()
            .find(|step| *step < current - f32::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PlayerConfig::from_json(r#"{"default_speed": 1.25}"#).unwrap();
        assert_eq!(config.default_speed, 1.25);
        assert_eq!(config.spans, SegmentSpans::default());
        assert!(config.scale_timers_by_rate);
    }

    #[test]
    fn test_speed_steps() {
        let config = PlayerConfig::default();
        assert_eq!(config.next_speed_up(1.0), Some(1.25));
        assert_eq!(config.next_speed_down(1.0), Some(0.75));
        assert_eq!(config.next_speed_up(2.0), None);
        assert_eq!(config.next_speed_down(0.5), None);
        // Скорость вне списка округляется к соседнему шагу
        assert_eq!(config.next_speed_up(1.1), Some(1.25));
    }
}
