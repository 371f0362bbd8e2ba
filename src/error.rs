//! Модуль обработки ошибок библиотеки lesson-sync
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.

use std::path::PathBuf;
use thiserror::Error;

/// Ошибки библиотеки lesson-sync
#[derive(Debug, Error)]
pub enum LessonError {
    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка обхода каталога уроков
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Не удалось прочитать файл транскрипта
    #[error("Failed to load transcript {path}: {source}")]
    TranscriptLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Пустой транскрипт
    #[error("Transcript is empty")]
    EmptyTranscript,

    /// Индекс предложения вне диапазона
    #[error("Sentence index {index} out of range (transcript has {len} sentences)")]
    SentenceOutOfRange { index: usize, len: usize },

    /// Некорректная ссылка на урок (`книга/урок`)
    #[error("Invalid lesson locator: {0}")]
    InvalidLocator(String),

    /// Неподдерживаемая версия экспортированных данных
    #[error("Unsupported export version: {0}")]
    UnsupportedExportVersion(String),

    /// Ошибка хранилища
    #[error("Storage error: {0}")]
    Storage(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl From<&str> for LessonError {
    fn from(s: &str) -> Self {
        LessonError::Other(s.to_string())
    }
}

impl From<String> for LessonError {
    fn from(s: String) -> Self {
        LessonError::Other(s)
    }
}

/// Ошибки медиаплеера
///
/// Контроллер воспроизведения никогда не пробрасывает их дальше.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Воспроизведение отклонено (например, политикой автозапуска)
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// Медиа ещё не загружено
    #[error("Media not ready")]
    NotReady,
}

/// Тип Result для библиотеки lesson-sync
pub type Result<T> = std::result::Result<T, LessonError>;
