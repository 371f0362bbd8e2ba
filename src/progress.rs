//! Модуль учёта прогресса обучения
//!
//! Хранит прогресс по урокам и общую статистику: время занятий по дням,
//! количество изученных уроков, серию дней подряд и данные для тепловой
//! карты. Все даты считаются в UTC.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{PROGRESS_KEY_PREFIX, STATISTICS_KEY};
use crate::error::{LessonError, Result};
use crate::events::{PlayerEvent, PlayerObserver};
use crate::store::{read_json, write_json, KeyValueStore};

/// Версия формата экспорта
pub const EXPORT_VERSION: &str = "1.0";

/// Источник текущего времени
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Прогресс по отдельному предложению
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SentenceProgress {
    pub learned: bool,
    /// Сколько раз предложение отмечалось изученным
    pub count: u32,
    /// Время последней отметки (мс с начала эпохи)
    pub last_time: i64,
    pub total_duration: u64,
}

/// Прогресс по уроку
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LessonProgress {
    pub book: String,
    pub lesson_id: String,
    /// Первое посещение (мс с начала эпохи)
    pub first_visit: i64,
    /// Последнее посещение (мс с начала эпохи)
    pub last_visit: i64,
    /// Количество сессий, в которых урок был пройден целиком
    pub completed_count: u32,
    /// Суммарное время занятий (секунды)
    pub total_time: u64,
    pub sentences: BTreeMap<usize, SentenceProgress>,
    /// Урок пройден; однажды установленный флаг не сбрасывается
    pub completed: bool,
    pub total_sentences: Option<usize>,
}

impl LessonProgress {
    pub fn learned_count(&self) -> usize {
        self.sentences.values().filter(|s| s.learned).count()
    }
}

/// Данные одной сессии для сохранения
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Длительность сессии (секунды)
    pub duration: u64,
    /// Количество прозвучавших предложений
    pub sentence_count: usize,
    pub completed: bool,
}

/// Статистика за день
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyStats {
    /// Уроки в виде `книга_урок`
    pub lessons: BTreeSet<String>,
    pub duration: u64,
    pub sentences: u64,
}

/// Общие итоги
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TotalStats {
    pub duration: u64,
    pub lessons: usize,
    pub days: usize,
    pub last_study: Option<i64>,
}

/// Общая статистика
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub total: TotalStats,
    /// Статистика по датам `YYYY-MM-DD`
    pub daily: BTreeMap<String, DailyStats>,
    pub streak: u32,
}

/// День тепловой карты
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapDay {
    pub date: String,
    /// Время занятий (секунды)
    pub value: u64,
    pub lessons: usize,
}

/// Экспортированный прогресс
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressExport {
    pub version: String,
    pub export_date: String,
    #[serde(default)]
    pub statistics: Option<Statistics>,
    /// Прогресс уроков по ключам хранилища
    #[serde(default)]
    pub progress: BTreeMap<String, LessonProgress>,
}

/// Менеджер прогресса
#[derive(Clone)]
pub struct ProgressManager {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl ProgressManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    /// Создать менеджер с заданным источником времени
    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn lesson_key(book: &str, lesson_id: &str) -> String {
        format!("{}{}_{}", PROGRESS_KEY_PREFIX, book, lesson_id)
    }

    fn progress_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(PROGRESS_KEY_PREFIX) && key != STATISTICS_KEY)
            .collect())
    }

    /// Сохранить итог сессии по уроку и обновить статистику
    pub fn save_lesson_progress(
        &self,
        book: &str,
        lesson_id: &str,
        update: &ProgressUpdate,
    ) -> Result<LessonProgress> {
        let progress = self.get_lesson_progress(book, lesson_id)?;
        let mut progress = progress.unwrap_or_else(|| self.new_progress(book, lesson_id));

        if update.completed {
            progress.completed_count += 1;
            progress.completed = true;
        }
        progress.total_time += update.duration;

        self.store_progress(progress, update)
    }

    pub fn get_lesson_progress(&self, book: &str, lesson_id: &str) -> Result<Option<LessonProgress>> {
        read_json(self.store.as_ref(), &Self::lesson_key(book, lesson_id))
    }

    /// Прогресс всех уроков книги
    pub fn get_book_progress(&self, book: &str) -> Result<Vec<LessonProgress>> {
        let prefix = format!("{}{}_", PROGRESS_KEY_PREFIX, book);
        let mut lessons = Vec::new();
        for key in self.progress_keys()? {
            if !key.starts_with(&prefix) {
                continue;
            }
            if let Some(progress) = read_json(self.store.as_ref(), &key)? {
                lessons.push(progress);
            }
        }
        Ok(lessons)
    }

    pub fn get_statistics(&self) -> Result<Statistics> {
        Ok(read_json(self.store.as_ref(), STATISTICS_KEY)?.unwrap_or_default())
    }

    /// Запомнить количество предложений урока при его открытии
    pub fn init_lesson(&self, book: &str, lesson_id: &str, total_sentences: usize) -> Result<LessonProgress> {
        let progress = self.get_lesson_progress(book, lesson_id)?;
        let mut progress = progress.unwrap_or_else(|| self.new_progress(book, lesson_id));
        progress.total_sentences = Some(total_sentences);
        self.store_progress(progress, &ProgressUpdate::default())
    }

    /// Отметить предложение изученным
    ///
    /// Когда изучены все предложения урока, урок считается пройденным.
    pub fn mark_sentence_learned(
        &self,
        book: &str,
        lesson_id: &str,
        sentence_index: usize,
        duration: u64,
    ) -> Result<LessonProgress> {
        let progress = self.get_lesson_progress(book, lesson_id)?;
        let mut progress = progress.unwrap_or_else(|| self.new_progress(book, lesson_id));

        let sentence = progress.sentences.entry(sentence_index).or_default();
        sentence.learned = true;
        sentence.count += 1;
        sentence.last_time = self.now().timestamp_millis();
        sentence.total_duration += duration;

        let total = progress.total_sentences.unwrap_or(0);
        if total > 0 && progress.learned_count() >= total {
            log::info!("Lesson {}/{} completed: all {} sentences learned", book, lesson_id, total);
            progress.completed = true;
        }

        self.store_progress(progress, &ProgressUpdate::default())
    }

    /// Данные тепловой карты за последние `days` дней, от старых к новым
    pub fn get_heatmap_data(&self, days: u32) -> Result<Vec<HeatmapDay>> {
        let stats = self.get_statistics()?;
        let today = self.today();

        Ok((0..days)
            .rev()
            .map(|offset| {
                let date = date_string(today - chrono::Duration::days(offset as i64));
                let daily = stats.daily.get(&date);
                HeatmapDay {
                    value: daily.map_or(0, |d| d.duration),
                    lessons: daily.map_or(0, |d| d.lessons.len()),
                    date,
                }
            })
            .collect())
    }

    /// Удалить весь прогресс и статистику
    pub fn clear_all_progress(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys()? {
            if (key.starts_with(PROGRESS_KEY_PREFIX) || key == STATISTICS_KEY) && self.store.remove(&key)? {
                removed += 1;
            }
        }
        log::info!("Cleared {} progress entries", removed);
        Ok(removed)
    }

    pub fn export_progress(&self) -> Result<ProgressExport> {
        let mut progress = BTreeMap::new();
        for key in self.progress_keys()? {
            if let Some(lesson) = read_json(self.store.as_ref(), &key)? {
                progress.insert(key, lesson);
            }
        }

        Ok(ProgressExport {
            version: EXPORT_VERSION.to_string(),
            export_date: self.now().to_rfc3339(),
            statistics: Some(self.get_statistics()?),
            progress,
        })
    }

    /// Импортировать прогресс; поддерживается только версия `1.0`
    pub fn import_progress(&self, data: &ProgressExport) -> Result<()> {
        if data.version != EXPORT_VERSION {
            return Err(LessonError::UnsupportedExportVersion(data.version.clone()));
        }

        if let Some(statistics) = &data.statistics {
            write_json(self.store.as_ref(), STATISTICS_KEY, statistics)?;
        }

        for (key, lesson) in &data.progress {
            if !key.starts_with(PROGRESS_KEY_PREFIX) {
                log::warn!("Skipping imported entry with foreign key '{}'", key);
                continue;
            }
            write_json(self.store.as_ref(), key, lesson)?;
        }

        log::info!("Imported progress for {} lessons", data.progress.len());
        Ok(())
    }

    /// Импортировать прогресс из JSON
    pub fn import_progress_json(&self, json: &str) -> Result<()> {
        let data: ProgressExport = serde_json::from_str(json)?;
        self.import_progress(&data)
    }

    fn new_progress(&self, book: &str, lesson_id: &str) -> LessonProgress {
        let now = self.now().timestamp_millis();
        LessonProgress {
            book: book.to_string(),
            lesson_id: lesson_id.to_string(),
            first_visit: now,
            last_visit: now,
            ..LessonProgress::default()
        }
    }

    fn store_progress(&self, mut progress: LessonProgress, update: &ProgressUpdate) -> Result<LessonProgress> {
        progress.last_visit = self.now().timestamp_millis();
        let key = Self::lesson_key(&progress.book, &progress.lesson_id);
        write_json(self.store.as_ref(), &key, &progress)?;
        self.update_statistics(&progress.book, &progress.lesson_id, update)?;
        Ok(progress)
    }

    fn update_statistics(&self, book: &str, lesson_id: &str, update: &ProgressUpdate) -> Result<Statistics> {
        let mut stats = self.get_statistics()?;
        let today = self.today();

        let daily = stats.daily.entry(date_string(today)).or_default();
        daily.lessons.insert(format!("{}_{}", book, lesson_id));
        daily.duration += update.duration;
        daily.sentences += update.sentence_count as u64;

        stats.total.duration += update.duration;
        stats.total.lessons = self.progress_keys()?.len();
        stats.total.days = stats.daily.len();
        stats.total.last_study = Some(self.now().timestamp_millis());
        stats.streak = calculate_streak(&stats.daily, today);

        write_json(self.store.as_ref(), STATISTICS_KEY, &stats)?;
        Ok(stats)
    }
}

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Количество дней подряд с занятиями
///
/// Отсутствие занятий сегодня серию не прерывает: отсчёт идёт со вчерашнего дня.
pub fn calculate_streak(daily: &BTreeMap<String, DailyStats>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    for offset in 0..daily.len() {
        let date = date_string(today - chrono::Duration::days(offset as i64));
        if daily.contains_key(&date) {
            streak += 1;
        } else if offset > 0 {
            break;
        }
    }
    streak
}

/// Длительность в виде `X小时Y分钟`, `Y分钟Z秒` или `Z秒`
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}小时{}分钟", hours, minutes)
    } else if minutes > 0 {
        format!("{}分钟{}秒", minutes, secs)
    } else {
        format!("{}秒", secs)
    }
}

/// Наблюдатель, сохраняющий итог сессии урока
pub struct ProgressRecorder {
    manager: ProgressManager,
    book: String,
    lesson_id: String,
}

impl ProgressRecorder {
    pub fn new(manager: ProgressManager, book: impl Into<String>, lesson_id: impl Into<String>) -> Self {
        Self {
            manager,
            book: book.into(),
            lesson_id: lesson_id.into(),
        }
    }
}

impl PlayerObserver for ProgressRecorder {
    fn on_event(&self, event: &PlayerEvent) {
        let PlayerEvent::SessionEnded {
            duration_secs,
            sentences_touched,
            all_sentences_touched,
        } = event
        else {
            return;
        };
        if *duration_secs == 0 {
            return;
        }

        let update = ProgressUpdate {
            duration: *duration_secs,
            sentence_count: *sentences_touched,
            completed: *all_sentences_touched,
        };
        if let Err(e) = self.manager.save_lesson_progress(&self.book, &self.lesson_id, &update) {
            log::warn!("Failed to save progress for {}/{}: {}", self.book, self.lesson_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use crate::store::MemoryStore;

    struct TestClock(Arc<Mutex<DateTime<Utc>>>);

    impl TestClock {
        fn at(y: i32, m: u32, d: u32) -> Self {
            Self(Arc::new(Mutex::new(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())))
        }

        fn clock(&self) -> Clock {
            let now = self.0.clone();
            Arc::new(move || *now.lock())
        }

        fn advance_days(&self, days: i64) {
            let mut now = self.0.lock();
            *now = *now + chrono::Duration::days(days);
        }
    }

    fn manager() -> (ProgressManager, Arc<MemoryStore>, TestClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = TestClock::at(2024, 3, 10);
        let manager = ProgressManager::with_clock(store.clone(), clock.clock());
        (manager, store, clock)
    }

    fn session(duration: u64, sentences: usize, completed: bool) -> ProgressUpdate {
        ProgressUpdate {
            duration,
            sentence_count: sentences,
            completed,
        }
    }

    #[test]
    fn test_save_accumulates_sessions() {
        let (manager, _, clock) = manager();
        let first = manager.save_lesson_progress("NCE1", "001&002", &session(60, 5, false)).unwrap();
        assert_eq!(first.total_time, 60);
        assert!(!first.completed);

        clock.advance_days(1);
        let second = manager.save_lesson_progress("NCE1", "001&002", &session(30, 8, true)).unwrap();
        assert_eq!(second.total_time, 90);
        assert_eq!(second.completed_count, 1);
        assert!(second.completed);
        assert_eq!(second.first_visit, first.first_visit);
        assert!(second.last_visit > first.last_visit);

        // Пройденный урок остаётся пройденным
        let third = manager.save_lesson_progress("NCE1", "001&002", &session(10, 1, false)).unwrap();
        assert!(third.completed);
        assert_eq!(third.completed_count, 1);
    }

    #[test]
    fn test_statistics_update() {
        let (manager, _, clock) = manager();
        manager.save_lesson_progress("NCE1", "a", &session(60, 5, false)).unwrap();
        manager.save_lesson_progress("NCE1", "b", &session(40, 3, false)).unwrap();
        manager.save_lesson_progress("NCE1", "a", &session(20, 2, false)).unwrap();

        let stats = manager.get_statistics().unwrap();
        let today = &stats.daily["2024-03-10"];
        assert_eq!(today.lessons.len(), 2);
        assert_eq!(today.duration, 120);
        assert_eq!(today.sentences, 10);
        assert_eq!(stats.total.duration, 120);
        assert_eq!(stats.total.lessons, 2);
        assert_eq!(stats.total.days, 1);
        assert_eq!(stats.streak, 1);
        assert!(stats.total.last_study.is_some());

        clock.advance_days(1);
        manager.save_lesson_progress("NCE2", "c", &session(10, 1, false)).unwrap();
        let stats = manager.get_statistics().unwrap();
        assert_eq!(stats.total.days, 2);
        assert_eq!(stats.total.lessons, 3);
        assert_eq!(stats.streak, 2);
    }

    #[test]
    fn test_streak_calculation() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let daily = |dates: &[&str]| -> BTreeMap<String, DailyStats> {
            dates.iter().map(|d| (d.to_string(), DailyStats::default())).collect()
        };

        assert_eq!(calculate_streak(&BTreeMap::new(), today), 0);
        assert_eq!(calculate_streak(&daily(&["2024-03-10", "2024-03-09", "2024-03-08"]), today), 3);
        // Сегодня ещё не занимались, но вчера и позавчера - да
        assert_eq!(calculate_streak(&daily(&["2024-03-09", "2024-03-08", "2024-03-01"]), today), 2);
        assert_eq!(calculate_streak(&daily(&["2024-03-10", "2024-03-08"]), today), 1);
        assert_eq!(calculate_streak(&daily(&["2024-03-05"]), today), 0);
    }

    #[test]
    fn test_mark_sentence_learned_completes_lesson() {
        let (manager, _, _) = manager();
        manager.init_lesson("NCE1", "001", 2).unwrap();

        let progress = manager.mark_sentence_learned("NCE1", "001", 0, 4).unwrap();
        assert!(!progress.completed);
        let progress = manager.mark_sentence_learned("NCE1", "001", 0, 3).unwrap();
        assert_eq!(progress.sentences[&0].count, 2);
        assert_eq!(progress.sentences[&0].total_duration, 7);
        assert!(!progress.completed);

        let progress = manager.mark_sentence_learned("NCE1", "001", 1, 2).unwrap();
        assert!(progress.completed);
        assert_eq!(progress.total_sentences, Some(2));

        // Без известного количества предложений урок не завершается
        let other = manager.mark_sentence_learned("NCE1", "002", 0, 1).unwrap();
        assert!(!other.completed);
    }

    #[test]
    fn test_book_progress_filters_by_book() {
        let (manager, _, _) = manager();
        manager.init_lesson("NCE1", "001", 10).unwrap();
        manager.init_lesson("NCE1", "002", 12).unwrap();
        manager.init_lesson("NCE10", "001", 8).unwrap();

        let book = manager.get_book_progress("NCE1").unwrap();
        assert_eq!(book.len(), 2);
        assert!(book.iter().all(|p| p.book == "NCE1"));
    }

    #[test]
    fn test_corrupt_progress_is_ignored() {
        let (manager, store, _) = manager();
        store.set("nce_progress_NCE1_001", "{broken").unwrap();
        assert_eq!(manager.get_lesson_progress("NCE1", "001").unwrap(), None);

        let progress = manager.save_lesson_progress("NCE1", "001", &session(5, 1, false)).unwrap();
        assert_eq!(progress.total_time, 5);
    }

    #[test]
    fn test_heatmap() {
        let (manager, _, clock) = manager();
        manager.save_lesson_progress("NCE1", "a", &session(60, 5, false)).unwrap();
        clock.advance_days(2);
        manager.save_lesson_progress("NCE1", "b", &session(30, 2, false)).unwrap();

        let heatmap = manager.get_heatmap_data(5).unwrap();
        assert_eq!(heatmap.len(), 5);
        assert_eq!(heatmap[0].date, "2024-03-08");
        assert_eq!(heatmap[4].date, "2024-03-12");
        assert_eq!(heatmap[2], HeatmapDay { date: "2024-03-10".to_string(), value: 60, lessons: 1 });
        assert_eq!(heatmap[3].value, 0);
        assert_eq!(heatmap[4].value, 30);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0秒");
        assert_eq!(format_duration(45), "45秒");
        assert_eq!(format_duration(125), "2分钟5秒");
        assert_eq!(format_duration(3 * 3600 + 7 * 60 + 9), "3小时7分钟");
    }

    #[test]
    fn test_export_import_roundtrip_and_clear() {
        let (manager, store, _) = manager();
        store.set("nce_playback_speed", "1.25").unwrap();
        manager.save_lesson_progress("NCE1", "a", &session(60, 5, true)).unwrap();

        let export = manager.export_progress().unwrap();
        assert_eq!(export.version, "1.0");
        assert_eq!(export.progress.len(), 1);
        assert!(export.progress.contains_key("nce_progress_NCE1_a"));

        assert_eq!(manager.clear_all_progress().unwrap(), 2);
        assert_eq!(manager.get_lesson_progress("NCE1", "a").unwrap(), None);
        assert_eq!(store.get("nce_playback_speed").unwrap(), Some("1.25".to_string()));

        let json = serde_json::to_string(&export).unwrap();
        manager.import_progress_json(&json).unwrap();
        let restored = manager.get_lesson_progress("NCE1", "a").unwrap().unwrap();
        assert!(restored.completed);
        assert_eq!(manager.get_statistics().unwrap().total.duration, 60);
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let (manager, _, _) = manager();
        let data = ProgressExport {
            version: "2.0".to_string(),
            export_date: String::new(),
            statistics: None,
            progress: BTreeMap::new(),
        };
        let err = manager.import_progress(&data).unwrap_err();
        assert!(matches!(err, LessonError::UnsupportedExportVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_recorder_saves_session_end() {
        let (manager, _, _) = manager();
        let recorder = ProgressRecorder::new(manager.clone(), "NCE2", "015");

        recorder.on_event(&PlayerEvent::SentenceActivated { index: 0 });
        recorder.on_event(&PlayerEvent::SessionEnded {
            duration_secs: 0,
            sentences_touched: 1,
            all_sentences_touched: false,
        });
        assert_eq!(manager.get_lesson_progress("NCE2", "015").unwrap(), None);

        recorder.on_event(&PlayerEvent::SessionEnded {
            duration_secs: 95,
            sentences_touched: 12,
            all_sentences_touched: true,
        });
        let progress = manager.get_lesson_progress("NCE2", "015").unwrap().unwrap();
        assert_eq!(progress.total_time, 95);
        assert!(progress.completed);
        assert_eq!(manager.get_statistics().unwrap().daily["2024-03-10"].sentences, 12);
    }
}
