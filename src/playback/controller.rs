//! Контроллер воспроизведения по предложениям
//!
//! Владеет состоянием «какое предложение активно», режимами повтора
//! и диктанта и держит не более одного запланированного таймера границы
//! сегмента. Все переходы выполняются в одном потоке управления в ответ
//! на события медиа, команды пользователя и срабатывания таймеров.

use std::collections::BTreeSet;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::config::PlayerConfig;
use crate::error::{LessonError, Result};
use crate::events::{EventDispatcher, PlayerEvent, PlayerObserver};
use crate::transcript::segment::{compute_effective_end, find_active_index, on_duration_known};
use crate::transcript::Transcript;
use super::ports::{BoundaryKind, MediaPlayer, Scheduler, TimerHandle};

/// Режим контроллера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Нет активного предложения
    Idle,
    /// Предложение активно, после него следует переход к следующему
    ActiveNormal,
    /// Предложение активно и повторяется
    ActiveLoop,
}

/// Запланированный таймер границы сегмента
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBoundary {
    pub handle: TimerHandle,
    pub kind: BoundaryKind,
    /// Предложение, для которого таймер был запланирован
    pub index: usize,
}

/// Состояние воспроизведения
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub active_index: Option<usize>,
    /// Конец сегмента активного предложения; не используется при `active_index == None`
    pub segment_end: f64,
    pub loop_enabled: bool,
    pub dictation_enabled: bool,
    /// Предложения, открытые в текущей сессии диктанта
    pub revealed: BTreeSet<usize>,
    pub pending: Option<PendingBoundary>,
}

/// Итог учебной сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub duration_secs: u64,
    pub sentences_touched: usize,
    pub all_sentences_touched: bool,
}

/// Контроллер воспроизведения
pub struct PlaybackController<M: MediaPlayer, S: Scheduler> {
    transcript: Transcript,
    media: M,
    scheduler: S,
    config: PlayerConfig,
    state: PlaybackState,
    dispatcher: EventDispatcher,
    /// Предложения, которые становились активными за сессию
    touched: BTreeSet<usize>,
}

impl<M: MediaPlayer, S: Scheduler> PlaybackController<M, S> {
    /// Создать контроллер для загруженного транскрипта
    pub fn new(transcript: Transcript, media: M, scheduler: S, config: PlayerConfig) -> Self {
        Self {
            transcript,
            media,
            scheduler,
            config,
            state: PlaybackState::default(),
            dispatcher: EventDispatcher::new(),
            touched: BTreeSet::new(),
        }
    }

    /// Получить транскрипт урока
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Получить текущее состояние воспроизведения
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Получить конфигурацию
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Получить медиаплеер
    pub fn media(&self) -> &M {
        &self.media
    }

    /// Получить изменяемую ссылку на медиаплеер
    ///
    /// Изменения позиции или скорости в обход контроллера не перепланируют
    /// ожидающий таймер.
    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    /// Получить планировщик таймеров
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Добавить наблюдателя событий
    pub fn add_observer(&mut self, observer: Box<dyn PlayerObserver>) -> usize {
        self.dispatcher.add_observer(observer)
    }

    /// Удалить наблюдателя событий
    pub fn remove_observer(&mut self, id: usize) -> Option<Box<dyn PlayerObserver>> {
        self.dispatcher.remove_observer(id)
    }

    /// Текущий режим: нет предложения, обычное воспроизведение или повтор
    pub fn mode(&self) -> PlaybackMode {
        match (self.valid_active_index(), self.state.loop_enabled) {
            (None, _) => PlaybackMode::Idle,
            (Some(_), false) => PlaybackMode::ActiveNormal,
            (Some(_), true) => PlaybackMode::ActiveLoop,
        }
    }

    /// Индекс активного предложения
    pub fn active_index(&self) -> Option<usize> {
        self.state.active_index
    }

    /// Конец сегмента активного предложения, в секундах медиа
    pub fn segment_end(&self) -> Option<f64> {
        self.state.active_index.map(|_| self.state.segment_end)
    }

    /// Ожидающий таймер границы, если он запланирован
    pub fn pending_boundary(&self) -> Option<PendingBoundary> {
        self.state.pending
    }

    /// Включён ли режим повтора
    pub fn is_loop_enabled(&self) -> bool {
        self.state.loop_enabled
    }

    /// Включён ли режим диктанта
    pub fn is_dictation_enabled(&self) -> bool {
        self.state.dictation_enabled
    }

    /// Является ли предложение активным
    pub fn is_active(&self, index: usize) -> bool {
        self.state.active_index == Some(index)
    }

    /// Открыто ли предложение в текущей сессии диктанта
    pub fn is_revealed(&self, index: usize) -> bool {
        self.state.revealed.contains(&index)
    }

    /// Скрыт ли текст предложения в режиме диктанта
    pub fn is_hidden(&self, index: usize) -> bool {
        self.state.dictation_enabled && !self.is_revealed(index)
    }

    /// Количество предложений, прозвучавших за сессию
    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }

    /// Воспроизвести предложение `index` с его начала
    ///
    /// Если начало ещё недоступно для перемотки, воспроизведение
    /// продолжается с текущей позиции.
    pub fn play_sentence(&mut self, index: usize) -> Result<()> {
        let record = self.transcript.get(index).ok_or(LessonError::SentenceOutOfRange {
            index,
            len: self.transcript.len(),
        })?;
        let start = record.start;
        let end = compute_effective_end(record, &self.config.spans);

        if self.media.can_seek_to(start) {
            self.media.set_position(start.max(0.0));
            self.start_media();
        } else {
            log::warn!(
                "Sentence {} start {:.2}s is not seekable yet, playing from {:.2}s",
                index,
                start,
                self.media.position()
            );
            if self.media.is_paused() {
                self.start_media();
            }
        }

        self.activate(index, end);
        self.cancel_pending();
        if !self.media.is_paused() {
            self.schedule_for_current();
        }
        Ok(())
    }

    /// Следующее предложение; без активного - первое
    pub fn next_sentence(&mut self) -> bool {
        let target = self.state.active_index.map_or(0, |i| i + 1);
        target < self.transcript.len() && self.play_sentence(target).is_ok()
    }

    /// Предыдущее предложение
    pub fn previous_sentence(&mut self) -> bool {
        match self.state.active_index {
            Some(i) if i > 0 => self.play_sentence(i - 1).is_ok(),
            _ => false,
        }
    }

    /// Повторить активное предложение с начала
    pub fn restart_sentence(&mut self) -> bool {
        match self.state.active_index {
            Some(i) => self.play_sentence(i).is_ok(),
            None => false,
        }
    }

    /// Переключить воспроизведение и паузу
    pub fn toggle_play_pause(&mut self) {
        if self.media.is_paused() {
            self.start_media();
            if !self.media.is_paused() {
                self.on_media_playing();
            }
        } else {
            self.media.pause();
            self.on_media_paused();
        }
    }

    /// Обработка периодического обновления позиции медиа
    ///
    /// В режиме повтора индекс не отслеживается.
    pub fn on_media_time_update(&mut self, t: f64) {
        if self.state.loop_enabled {
            return;
        }

        let Some(index) = find_active_index(&self.transcript.sentences, t, &self.config.spans) else {
            return;
        };
        if self.state.active_index == Some(index) {
            return;
        }

        let end = compute_effective_end(&self.transcript.sentences[index], &self.config.spans);
        self.activate(index, end);

        if !self.media.is_paused() && self.state.pending.is_none() {
            self.schedule_for_current();
        }
    }

    /// Срабатывание таймера границы сегмента
    ///
    /// Таймер, не совпадающий с ожидающим, считается устаревшим и игнорируется.
    ///
    /// Автопереход идёт к предложению, следующему за тем, для которого таймер
    /// был запланирован, а не за активным: обновление позиции может сдвинуть
    /// активный индекс вперёд, пока таймер ещё ожидает, и переход от него
    /// пропустил бы предложение.
    pub fn on_boundary_reached(&mut self, handle: TimerHandle) {
        let pending = match self.state.pending {
            Some(pending) if pending.handle == handle => pending,
            _ => {
                log::debug!("Ignoring stale boundary timer {:?}", handle);
                return;
            }
        };
        self.state.pending = None;

        if self.state.loop_enabled {
            self.restart_loop();
            return;
        }

        let next = pending.index + 1;
        if next < self.transcript.len() {
            log::debug!("Auto-advancing to sentence {}", next);
            if let Err(e) = self.play_sentence(next) {
                log::warn!("Auto-advance failed: {}", e);
            }
        } else {
            log::debug!("Reached the end of the transcript at sentence {}", pending.index);
            self.media.pause();
            self.dispatcher.notify(PlayerEvent::PlaybackFinished { last_index: pending.index });
        }
    }

    /// Переключить режим повтора предложения
    pub fn toggle_loop(&mut self) -> bool {
        self.state.loop_enabled = !self.state.loop_enabled;
        let enabled = self.state.loop_enabled;
        log::debug!("Loop mode {}", if enabled { "on" } else { "off" });
        self.dispatcher.notify(PlayerEvent::LoopChanged { enabled });

        if let Some(index) = self.valid_active_index() {
            if !self.media.is_paused() {
                if enabled {
                    self.state.segment_end =
                        compute_effective_end(&self.transcript.sentences[index], &self.config.spans);
                }
                self.schedule_for_current();
            }
        }
        enabled
    }

    /// Переключить режим диктанта; открытые предложения сбрасываются
    pub fn toggle_dictation(&mut self) -> bool {
        self.state.dictation_enabled = !self.state.dictation_enabled;
        self.state.revealed.clear();
        let enabled = self.state.dictation_enabled;
        self.dispatcher.notify(PlayerEvent::DictationChanged { enabled });
        enabled
    }

    /// Открыть текст предложения в режиме диктанта
    pub fn reveal_sentence(&mut self, index: usize) -> bool {
        if !self.state.dictation_enabled || index >= self.transcript.len() {
            return false;
        }
        if !self.state.revealed.insert(index) {
            return false;
        }
        self.dispatcher.notify(PlayerEvent::SentenceRevealed { index });
        true
    }

    /// Медиа поставлено на паузу: ожидающий таймер отменяется
    pub fn on_media_paused(&mut self) {
        self.cancel_pending();
    }

    /// Воспроизведение возобновилось: таймер планируется заново для активного предложения
    pub fn on_media_playing(&mut self) {
        if self.state.pending.is_none() && self.valid_active_index().is_some() {
            self.schedule_for_current();
        }
    }

    /// Медиа доиграло до конца; активное предложение сбрасывается
    pub fn on_media_ended(&mut self) {
        self.cancel_pending();
        self.state.active_index = None;
        self.dispatcher.notify(PlayerEvent::MediaEnded);
    }

    /// Длительность медиа стала известна
    pub fn on_duration_known(&mut self, total_duration: f64) {
        if !on_duration_known(&mut self.transcript.sentences, total_duration) {
            return;
        }
        self.dispatcher.notify(PlayerEvent::DurationKnown { duration: total_duration });

        let last = self.transcript.len() - 1;
        if self.state.active_index == Some(last) {
            self.state.segment_end =
                compute_effective_end(&self.transcript.sentences[last], &self.config.spans);
            if self.state.pending.is_some() {
                self.schedule_for_current();
            }
        }
    }

    /// Установить скорость воспроизведения
    pub fn set_playback_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            log::warn!("Ignoring invalid playback rate {}", rate);
            return;
        }
        self.media.set_playback_rate(rate);
        if self.state.pending.is_some() && !self.media.is_paused() {
            self.schedule_for_current();
        }
    }

    /// Следующая ступень скорости вверх; `None`, если выше нет
    pub fn speed_up(&mut self) -> Option<f32> {
        let next = self.config.next_speed_up(self.media.playback_rate() as f32)?;
        self.set_playback_rate(next as f64);
        Some(next)
    }

    /// Следующая ступень скорости вниз; `None`, если ниже нет
    pub fn speed_down(&mut self) -> Option<f32> {
        let next = self.config.next_speed_down(self.media.playback_rate() as f32)?;
        self.set_playback_rate(next as f64);
        Some(next)
    }

    /// Завершить сессию и сообщить итог наблюдателям
    pub fn end_session(&mut self, elapsed: Duration) -> SessionSummary {
        self.cancel_pending();
        let summary = SessionSummary {
            duration_secs: elapsed.as_secs(),
            sentences_touched: self.touched.len(),
            all_sentences_touched: self.touched.len() == self.transcript.len(),
        };
        log::info!(
            "Session ended: {}s, {}/{} sentences",
            summary.duration_secs,
            summary.sentences_touched,
            self.transcript.len()
        );
        self.dispatcher.notify(PlayerEvent::SessionEnded {
            duration_secs: summary.duration_secs,
            sentences_touched: summary.sentences_touched,
            all_sentences_touched: summary.all_sentences_touched,
        });
        summary
    }

    fn valid_active_index(&self) -> Option<usize> {
        self.state.active_index.filter(|i| *i < self.transcript.len())
    }

    fn activate(&mut self, index: usize, segment_end: f64) {
        self.state.active_index = Some(index);
        self.state.segment_end = segment_end;
        self.touched.insert(index);
        self.dispatcher.notify(PlayerEvent::SentenceActivated { index });
    }

    /// Повтор активного предложения
    fn restart_loop(&mut self) {
        let Some(index) = self.valid_active_index() else {
            return;
        };
        let record = &self.transcript.sentences[index];
        let start = record.start;
        let end = compute_effective_end(record, &self.config.spans);

        if self.media.can_seek_to(start) {
            self.media.set_position(start);
        }
        self.start_media();
        self.state.segment_end = end;

        if !self.media.is_paused() {
            self.schedule_boundary(BoundaryKind::Loop, end - start);
        }
    }

    fn start_media(&mut self) {
        if let Err(e) = self.media.play() {
            log::debug!("Play request failed, keeping intended state: {}", e);
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.state.pending.take() {
            self.scheduler.cancel(pending.handle);
        }
    }

    /// Запланировать таймер до конца текущего сегмента
    fn schedule_for_current(&mut self) {
        let kind = if self.state.loop_enabled {
            BoundaryKind::Loop
        } else {
            BoundaryKind::Advance
        };
        let remaining = self.state.segment_end - self.media.position();
        self.schedule_boundary(kind, remaining);
    }

    /// Единственная точка планирования: старый таймер всегда отменяется
    fn schedule_boundary(&mut self, kind: BoundaryKind, media_secs: f64) {
        self.cancel_pending();
        let Some(index) = self.valid_active_index() else {
            return;
        };

        let delay = self.wall_delay(media_secs);
        let handle = self.scheduler.schedule_after(delay, kind);
        log::debug!(
            "Scheduled {:?} for sentence {} in {}ms",
            kind,
            index,
            delay.as_millis()
        );
        self.state.pending = Some(PendingBoundary { handle, kind, index });
    }

    /// Задержка таймера в реальном времени
    ///
    /// Значение, не помещающееся в `Duration`, ограничивается `Duration::MAX`.
    fn wall_delay(&self, media_secs: f64) -> Duration {
        let mut secs = media_secs.max(0.0);
        if self.config.scale_timers_by_rate {
            let rate = self.media.playback_rate();
            if rate.is_finite() && rate > 0.0 {
                secs /= rate;
            }
        }
        if secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or_else(|_| {
            log::warn!("Boundary delay of {}s is out of range, clamping", secs);
            Duration::MAX
        })
    }
}
