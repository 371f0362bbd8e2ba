//! Основной файл библиотеки lesson-sync
//!
//! Библиотека синхронизирует аудио урока с его транскриптом: разбирает
//! транскрипт с временными метками, определяет звучащее предложение,
//! управляет повтором, диктантом и автопереходом, а также сохраняет
//! прогресс обучения.

pub mod error;
pub mod config;
pub mod logger;
pub mod transcript;
pub mod events;
pub mod notification;
pub mod playback;
pub mod store;
pub mod progress;
pub mod favorites;
pub mod preferences;
pub mod catalog;

use std::path::Path;
use std::time::{Duration, Instant};

pub use crate::catalog::{Catalog, LessonRef, Neighbors};
pub use crate::config::{PlayerConfig, SegmentSpans};
pub use crate::error::{LessonError, MediaError, Result};
pub use crate::events::{PlayerEvent, PlayerObserver};
pub use crate::playback::{
    BoundaryKind, MediaPlayer, PlaybackController, PlaybackMode, Scheduler, SessionSummary, TimerHandle,
    TokioScheduler,
};
pub use crate::progress::{LessonProgress, ProgressManager, ProgressRecorder};
pub use crate::transcript::{load_transcript, parse_transcript, SentenceRecord, Transcript};

/// Сессия изучения одного урока
///
/// Смена урока означает новую сессию: новый транскрипт, новый контроллер
/// и новый отсчёт времени.
pub struct LessonSession<M: MediaPlayer, S: Scheduler> {
    lesson: LessonRef,
    controller: PlaybackController<M, S>,
    started: Instant,
}

impl<M: MediaPlayer, S: Scheduler> LessonSession<M, S> {
    /// Создать сессию из текста транскрипта
    pub fn load(
        lesson: LessonRef,
        transcript_text: &str,
        media: M,
        scheduler: S,
        config: PlayerConfig,
    ) -> Result<Self> {
        let transcript = parse_transcript(transcript_text)?;
        Self::start(lesson, transcript, media, scheduler, config)
    }

    /// Создать сессию, прочитав транскрипт из `<root>/<книга>/<урок>.lrc`
    pub fn open(
        root: &Path,
        lesson: LessonRef,
        media: M,
        scheduler: S,
        config: PlayerConfig,
    ) -> Result<Self> {
        let transcript = load_transcript(lesson.transcript_path(root))?;
        Self::start(lesson, transcript, media, scheduler, config)
    }

    /// Урок без предложений не открывается
    fn start(
        lesson: LessonRef,
        transcript: Transcript,
        media: M,
        scheduler: S,
        config: PlayerConfig,
    ) -> Result<Self> {
        if transcript.is_empty() {
            return Err(LessonError::EmptyTranscript);
        }
        log::info!("Loaded lesson {} with {} sentences", lesson, transcript.len());
        Ok(Self {
            lesson,
            controller: PlaybackController::new(transcript, media, scheduler, config),
            started: Instant::now(),
        })
    }

    /// Получить ссылку на урок
    pub fn lesson(&self) -> &LessonRef {
        &self.lesson
    }

    /// Получить контроллер воспроизведения
    pub fn controller(&self) -> &PlaybackController<M, S> {
        &self.controller
    }

    /// Получить изменяемую ссылку на контроллер
    pub fn controller_mut(&mut self) -> &mut PlaybackController<M, S> {
        &mut self.controller
    }

    /// Заголовок урока (тег `ti` или имя файла)
    pub fn title(&self) -> &str {
        self.controller.transcript().title_or(&self.lesson.lesson_id)
    }

    /// Подзаголовок «альбом · автор» (или «книга · автор»)
    pub fn subtitle(&self) -> String {
        self.controller.transcript().subtitle_or(&self.lesson.book)
    }

    /// Время с начала сессии
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Подключить сохранение прогресса
    ///
    /// Запоминает количество предложений урока и сохраняет итог сессии
    /// при её завершении.
    pub fn record_progress(&mut self, manager: ProgressManager) -> Result<LessonProgress> {
        let progress = manager.init_lesson(
            &self.lesson.book,
            &self.lesson.lesson_id,
            self.controller.transcript().len(),
        )?;
        let recorder = ProgressRecorder::new(manager, self.lesson.book.clone(), self.lesson.lesson_id.clone());
        self.controller.add_observer(Box::new(recorder));
        Ok(progress)
    }

    /// Завершить сессию
    pub fn finish(mut self) -> SessionSummary {
        let elapsed = self.elapsed();
        self.controller.end_session(elapsed)
    }
}
