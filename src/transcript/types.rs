use serde::{Deserialize, Serialize};

/// Метаданные транскрипта из строк вида `[ti:Название]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMeta {
    /// Книга / альбом (`al`)
    pub album: Option<String>,
    /// Автор (`ar`)
    pub artist: Option<String>,
    /// Название урока (`ti`)
    pub title: Option<String>,
    /// Кем подготовлен (`by`)
    pub by: Option<String>,
}

impl TranscriptMeta {
    /// Записать значение по ключу метаданных; неизвестные ключи игнорируются
    pub(crate) fn set(&mut self, key: &str, value: String) {
        let slot = match key {
            "al" => &mut self.album,
            "ar" => &mut self.artist,
            "ti" => &mut self.title,
            "by" => &mut self.by,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// Одно предложение транскрипта
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    /// Время начала (секунды)
    pub start: f64,
    /// Время окончания (секунды); `None`, пока оно неизвестно
    pub end: Option<f64>,
    /// Текст на изучаемом языке
    pub primary_text: String,
    /// Перевод (может быть пустым)
    pub translated_text: String,
}

impl SentenceRecord {
    /// Создать предложение с неизвестным временем окончания
    pub fn new(start: f64, primary_text: impl Into<String>, translated_text: impl Into<String>) -> Self {
        Self {
            start,
            end: None,
            primary_text: primary_text.into(),
            translated_text: translated_text.into(),
        }
    }

    /// Есть ли у предложения перевод
    pub fn has_translation(&self) -> bool {
        !self.translated_text.is_empty()
    }
}

/// Разобранный транскрипт урока
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub meta: TranscriptMeta,
    pub sentences: Vec<SentenceRecord>,
}

impl Transcript {
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SentenceRecord> {
        self.sentences.get(index)
    }

    /// Заголовок урока, либо `fallback`, если тег `ti` отсутствует
    pub fn title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.meta.title.as_deref().unwrap_or(fallback)
    }

    /// Подзаголовок «книга · автор»
    pub fn subtitle_or(&self, book_fallback: &str) -> String {
        let album = self.meta.album.as_deref().unwrap_or(book_fallback);
        let artist = self.meta.artist.as_deref().unwrap_or("");
        format!("{} · {}", album, artist).trim().to_string()
    }
}
