//! Пример проигрывания урока с имитацией медиаплеера
//!
//! Запуск: `cargo run --example lesson_player -- path/to/lesson.lrc [скорость]`
//!
//! Позиция медиа идёт по системным часам с учётом скорости, таймеры
//! границ предложений планируются через `TokioScheduler`.

use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::{Context, Result};
use lesson_sync::{
    logger,
    notification::ChannelObserver,
    progress::format_duration,
    store::MemoryStore,
    LessonRef, LessonSession, MediaError, MediaPlayer, PlayerConfig, PlayerEvent, ProgressManager,
    TokioScheduler,
};

/// Медиаплеер, позиция которого идёт по системным часам
struct SimulatedMedia {
    /// Позиция на момент последней остановки или перемотки
    base: f64,
    /// Момент запуска, если воспроизведение идёт
    playing_since: Option<Instant>,
    rate: f64,
}

impl SimulatedMedia {
    fn new() -> Self {
        Self {
            base: 0.0,
            playing_since: None,
            rate: 1.0,
        }
    }

    fn freeze(&mut self) {
        self.base = self.position();
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }
}

impl MediaPlayer for SimulatedMedia {
    fn position(&self) -> f64 {
        match self.playing_since {
            Some(since) => self.base + since.elapsed().as_secs_f64() * self.rate,
            None => self.base,
        }
    }

    fn set_position(&mut self, position: f64) {
        self.freeze();
        self.base = position;
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.freeze();
        self.rate = rate;
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }

    fn can_seek_to(&self, position: f64) -> bool {
        position >= 0.0
    }

    fn play(&mut self) -> std::result::Result<(), MediaError> {
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.freeze();
        self.playing_since = None;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .context("usage: lesson_player <lesson.lrc> [rate]")?;
    let rate: f64 = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid rate '{}'", raw))?,
        None => 4.0,
    };

    let text = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path))?;
    let lesson_id = std::path::Path::new(&path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lesson".to_string());
    let lesson = LessonRef::new("demo", lesson_id);

    let (scheduler, mut fired) = TokioScheduler::new();
    let manager = ProgressManager::new(Arc::new(MemoryStore::new()));

    let mut session = LessonSession::load(
        lesson.clone(),
        &text,
        SimulatedMedia::new(),
        scheduler,
        PlayerConfig::default(),
    )?;
    session.record_progress(manager.clone())?;

    let (observer, mut events) = ChannelObserver::channel();
    session.controller_mut().add_observer(Box::new(observer));

    println!("{}", session.title());
    println!("{}", session.subtitle());
    println!("Playing {} sentences at {}x", session.controller().transcript().len(), rate);

    session.controller_mut().set_playback_rate(rate);
    session.controller_mut().play_sentence(0)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            Some(timer) = fired.recv() => {
                session.controller_mut().on_boundary_reached(timer.handle);
            }
            Some(event) = events.recv() => {
                match event {
                    PlayerEvent::SentenceActivated { index } => {
                        if let Some(sentence) = session.controller().transcript().get(index) {
                            println!("[{:>3}] {:>7.2}s  {}", index, sentence.start, sentence.primary_text);
                            if sentence.has_translation() {
                                println!("              {}", sentence.translated_text);
                            }
                        }
                    }
                    PlayerEvent::PlaybackFinished { .. } => break,
                    _ => {}
                }
            }
            _ = ticker.tick() => {
                let position = session.controller().media().position();
                session.controller_mut().on_media_time_update(position);
            }
        }
    }

    let summary = session.finish();
    println!(
        "Session finished: {} sentences touched, all: {}",
        summary.sentences_touched, summary.all_sentences_touched
    );

    if let Some(progress) = manager.get_lesson_progress(&lesson.book, &lesson.lesson_id)? {
        println!("Total study time: {}", format_duration(progress.total_time));
    }

    Ok(())
}
