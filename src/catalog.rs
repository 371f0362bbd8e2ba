//! Каталог уроков
//!
//! Урок адресуется строкой `книга/файл`, например `NCE1/001&002－Excuse Me`.
//! Аудио и транскрипт лежат рядом: `<книга>/<файл>.mp3` и `<книга>/<файл>.lrc`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{LessonError, Result};

/// Ссылка на урок
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    pub book: String,
    pub lesson_id: String,
}

impl LessonRef {
    pub fn new(book: impl Into<String>, lesson_id: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            lesson_id: lesson_id.into(),
        }
    }

    /// Разобрать `книга/файл`; всё после первого `/` - имя файла
    pub fn from_locator(locator: &str) -> Result<Self> {
        match locator.split_once('/') {
            Some((book, lesson_id)) if !book.is_empty() && !lesson_id.is_empty() => {
                Ok(Self::new(book, lesson_id))
            }
            _ => Err(LessonError::InvalidLocator(locator.to_string())),
        }
    }

    pub fn locator(&self) -> String {
        format!("{}/{}", self.book, self.lesson_id)
    }

    /// Номер книги: цифры после `NCE`, по умолчанию 1
    pub fn book_number(&self) -> u32 {
        book_number(&self.book)
    }

    pub fn audio_path(&self, root: &Path) -> PathBuf {
        root.join(&self.book).join(format!("{}.mp3", self.lesson_id))
    }

    pub fn transcript_path(&self, root: &Path) -> PathBuf {
        root.join(&self.book).join(format!("{}.lrc", self.lesson_id))
    }
}

impl fmt::Display for LessonRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.book, self.lesson_id)
    }
}

fn book_number(book: &str) -> u32 {
    let digits: String = book
        .replacen("NCE", "", 1)
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => 1,
    }
}

/// Запись каталога
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Соседние уроки
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub previous: Option<LessonRef>,
    pub next: Option<LessonRef>,
}

/// Каталог уроков по номерам книг
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    books: BTreeMap<u32, Vec<CatalogEntry>>,
}

impl Catalog {
    /// Разобрать индекс вида `{"1": [{"filename": ...}, ...]}`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Построить каталог по дереву `<корень>/<книга>/<урок>.lrc`
    pub fn scan_dir(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut books: BTreeMap<u32, Vec<CatalogEntry>> = BTreeMap::new();

        for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "lrc") {
                continue;
            }

            let (Some(book), Some(stem)) = (
                path.parent().and_then(|p| p.file_name()),
                path.file_stem(),
            ) else {
                continue;
            };

            books
                .entry(book_number(&book.to_string_lossy()))
                .or_default()
                .push(CatalogEntry {
                    filename: stem.to_string_lossy().into_owned(),
                    title: None,
                });
        }

        for lessons in books.values_mut() {
            lessons.sort_by(|a, b| a.filename.cmp(&b.filename));
        }

        log::info!(
            "Scanned {} lessons in {} books under {}",
            books.values().map(Vec::len).sum::<usize>(),
            books.len(),
            root.display()
        );
        Ok(Self { books })
    }

    pub fn lessons(&self, book_number: u32) -> &[CatalogEntry] {
        self.books.get(&book_number).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn book_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.books.keys().copied()
    }

    /// Предыдущий и следующий уроки той же книги
    pub fn neighbors(&self, lesson: &LessonRef) -> Neighbors {
        let lessons = self.lessons(lesson.book_number());
        let Some(i) = lessons.iter().position(|e| e.filename == lesson.lesson_id) else {
            return Neighbors::default();
        };

        let sibling = |entry: &CatalogEntry| LessonRef::new(lesson.book.clone(), entry.filename.clone());
        Neighbors {
            previous: i.checked_sub(1).map(|p| sibling(&lessons[p])),
            next: lessons.get(i + 1).map(sibling),
        }
    }
}
