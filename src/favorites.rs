//! Избранные предложения и словарь

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{FAVORITES_KEY, VOCABULARY_KEY};
use crate::error::Result;
use crate::progress::Clock;
use crate::store::{read_json, write_json, KeyValueStore};
use crate::transcript::SentenceRecord;

const DAY_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Избранное предложение
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteSentence {
    pub book: String,
    pub lesson_id: String,
    pub sentence_index: usize,
    pub en: String,
    #[serde(default)]
    pub cn: String,
    pub timestamp: i64,
}

impl FavoriteSentence {
    fn is(&self, book: &str, lesson_id: &str, sentence_index: usize) -> bool {
        self.book == book && self.lesson_id == lesson_id && self.sentence_index == sentence_index
    }
}

/// Сводка по избранному
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesStatistics {
    pub total: usize,
    pub by_book: BTreeMap<String, usize>,
    /// Последние десять, от новых к старым
    pub recent: Vec<FavoriteSentence>,
}

/// Слово в словаре
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyWord {
    pub word: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub book: String,
    #[serde(default)]
    pub lesson_id: String,
    pub timestamp: i64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub last_review: Option<i64>,
}

impl VocabularyWord {
    fn matches(&self, word: &str) -> bool {
        self.word.to_lowercase() == word.to_lowercase()
    }

    /// Пора ли повторить слово: интервал 2^review_count дней
    fn is_due(&self, now_ms: i64) -> bool {
        match self.last_review {
            None => true,
            Some(last) => {
                let days_since = (now_ms - last) as f64 / DAY_MS;
                days_since >= 2f64.powi(self.review_count as i32)
            }
        }
    }
}

/// Откуда взято слово
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordContext {
    pub sentence: String,
    pub translation: String,
    pub notes: String,
    pub book: String,
    pub lesson_id: String,
}

/// Экспорт избранного и словаря
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesExport {
    #[serde(default)]
    pub favorites: Option<Vec<FavoriteSentence>>,
    #[serde(default)]
    pub vocabulary: Option<Vec<VocabularyWord>>,
    #[serde(default)]
    pub export_date: String,
}

/// Менеджер избранного и словаря
#[derive(Clone)]
pub struct FavoritesManager {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl FavoritesManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    fn now_ms(&self) -> i64 {
        (self.clock)().timestamp_millis()
    }

    pub fn favorites(&self) -> Result<Vec<FavoriteSentence>> {
        Ok(read_json(self.store.as_ref(), FAVORITES_KEY)?.unwrap_or_default())
    }

    pub fn is_favorite(&self, book: &str, lesson_id: &str, sentence_index: usize) -> Result<bool> {
        Ok(self
            .favorites()?
            .iter()
            .any(|f| f.is(book, lesson_id, sentence_index)))
    }

    /// Добавить предложение в избранное; повторное добавление игнорируется
    pub fn add_favorite(
        &self,
        book: &str,
        lesson_id: &str,
        sentence_index: usize,
        sentence: &SentenceRecord,
    ) -> Result<bool> {
        let mut favorites = self.favorites()?;
        if favorites.iter().any(|f| f.is(book, lesson_id, sentence_index)) {
            return Ok(false);
        }

        favorites.push(FavoriteSentence {
            book: book.to_string(),
            lesson_id: lesson_id.to_string(),
            sentence_index,
            en: sentence.primary_text.clone(),
            cn: sentence.translated_text.clone(),
            timestamp: self.now_ms(),
        });
        write_json(self.store.as_ref(), FAVORITES_KEY, &favorites)?;
        Ok(true)
    }

    pub fn remove_favorite(&self, book: &str, lesson_id: &str, sentence_index: usize) -> Result<bool> {
        let favorites = self.favorites()?;
        let before = favorites.len();
        let filtered: Vec<_> = favorites
            .into_iter()
            .filter(|f| !f.is(book, lesson_id, sentence_index))
            .collect();
        write_json(self.store.as_ref(), FAVORITES_KEY, &filtered)?;
        Ok(filtered.len() < before)
    }

    /// Переключить избранное; возвращает новое состояние
    pub fn toggle_favorite(
        &self,
        book: &str,
        lesson_id: &str,
        sentence_index: usize,
        sentence: &SentenceRecord,
    ) -> Result<bool> {
        if self.is_favorite(book, lesson_id, sentence_index)? {
            self.remove_favorite(book, lesson_id, sentence_index)?;
            Ok(false)
        } else {
            self.add_favorite(book, lesson_id, sentence_index, sentence)?;
            Ok(true)
        }
    }

    pub fn statistics(&self) -> Result<FavoritesStatistics> {
        let favorites = self.favorites()?;

        let mut by_book = BTreeMap::new();
        for favorite in &favorites {
            *by_book.entry(favorite.book.clone()).or_insert(0) += 1;
        }
        let recent = favorites.iter().rev().take(10).cloned().collect();

        Ok(FavoritesStatistics {
            total: favorites.len(),
            by_book,
            recent,
        })
    }

    pub fn vocabulary(&self) -> Result<Vec<VocabularyWord>> {
        Ok(read_json(self.store.as_ref(), VOCABULARY_KEY)?.unwrap_or_default())
    }

    /// Добавить слово; слова сравниваются без учёта регистра
    pub fn add_word(&self, word: &str, context: WordContext) -> Result<bool> {
        let mut vocabulary = self.vocabulary()?;
        if vocabulary.iter().any(|v| v.matches(word)) {
            return Ok(false);
        }

        vocabulary.push(VocabularyWord {
            word: word.to_string(),
            context: context.sentence,
            translation: context.translation,
            notes: context.notes,
            book: context.book,
            lesson_id: context.lesson_id,
            timestamp: self.now_ms(),
            review_count: 0,
            last_review: None,
        });
        write_json(self.store.as_ref(), VOCABULARY_KEY, &vocabulary)?;
        Ok(true)
    }

    pub fn remove_word(&self, word: &str) -> Result<bool> {
        let vocabulary = self.vocabulary()?;
        let before = vocabulary.len();
        let filtered: Vec<_> = vocabulary.into_iter().filter(|v| !v.matches(word)).collect();
        write_json(self.store.as_ref(), VOCABULARY_KEY, &filtered)?;
        Ok(filtered.len() < before)
    }

    /// Отметить повторение слова
    pub fn mark_word_reviewed(&self, word: &str) -> Result<bool> {
        let mut vocabulary = self.vocabulary()?;
        let now = self.now_ms();
        let Some(item) = vocabulary.iter_mut().find(|v| v.matches(word)) else {
            return Ok(false);
        };
        item.review_count += 1;
        item.last_review = Some(now);
        write_json(self.store.as_ref(), VOCABULARY_KEY, &vocabulary)?;
        Ok(true)
    }

    /// Слова, которые пора повторить
    ///
    /// Сначала ни разу не повторённые, затем по давности последнего повторения.
    pub fn words_for_review(&self, limit: usize) -> Result<Vec<VocabularyWord>> {
        let now = self.now_ms();
        let mut due: Vec<_> = self
            .vocabulary()?
            .into_iter()
            .filter(|w| w.is_due(now))
            .collect();
        due.sort_by_key(|w| (w.last_review.is_some(), w.last_review));
        due.truncate(limit);
        Ok(due)
    }

    pub fn export_data(&self) -> Result<FavoritesExport> {
        Ok(FavoritesExport {
            favorites: Some(self.favorites()?),
            vocabulary: Some(self.vocabulary()?),
            export_date: (self.clock)().to_rfc3339(),
        })
    }

    /// Импорт заменяет присутствующие в данных списки целиком
    pub fn import_data(&self, data: &FavoritesExport) -> Result<()> {
        if let Some(favorites) = &data.favorites {
            write_json(self.store.as_ref(), FAVORITES_KEY, favorites)?;
        }
        if let Some(vocabulary) = &data.vocabulary {
            write_json(self.store.as_ref(), VOCABULARY_KEY, vocabulary)?;
        }
        Ok(())
    }
}
