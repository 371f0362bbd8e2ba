//! Модуль для парсинга транскриптов
//!
//! Формат: строки метаданных `[ключ:значение]` (ключи `al`, `ar`, `ti`, `by`)
//! и строки содержимого, начинающиеся с одной или нескольких меток `[мм:сс]`
//! или `[мм:сс.доли]`. Перевод задаётся либо через `|` в той же строке,
//! либо следующей строкой с той же меткой и текстом на китайском.

use std::path::Path;
use lazy_static::lazy_static;
use regex::Regex;
use crate::error::{LessonError, Result};
use super::types::{SentenceRecord, Transcript, TranscriptMeta};

lazy_static! {
    static ref LINE_RE: Regex = Regex::new(r"^((?:\[\d+:\d+(?:\.\d+)?\])+)(.*)$").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"\[(\d+):(\d+(?:\.\d+)?)\]").unwrap();
    static ref META_RE: Regex = Regex::new(r"(?i)^\[(al|ar|ti|by):(.+)\]$").unwrap();
    static ref CJK_RE: Regex = Regex::new(r"[\x{3400}-\x{9FFF}\x{F900}-\x{FAFF}]").unwrap();
}

/// Чтение и парсинг файла транскрипта
pub fn load_transcript<P: AsRef<Path>>(path: P) -> Result<Transcript> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LessonError::TranscriptLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let transcript = parse_transcript(&text)?;
    log::info!(
        "Loaded transcript {} ({} sentences)",
        path.display(),
        transcript.len()
    );
    Ok(transcript)
}

/// Парсинг текста транскрипта
///
/// Нераспознанные строки молча пропускаются; ошибка возвращается
/// только для пустого входа.
pub fn parse_transcript(text: &str) -> Result<Transcript> {
    if text.trim().is_empty() {
        return Err(LessonError::EmptyTranscript);
    }

    let normalized = text.replace('\r', "");
    let rows: Vec<&str> = normalized.split('\n').collect();

    let mut meta = TranscriptMeta::default();
    let mut sentences = Vec::new();
    let mut i = 0;

    while i < rows.len() {
        let raw = rows[i].trim();
        i += 1;

        if raw.is_empty() {
            continue;
        }

        if let Some(caps) = META_RE.captures(raw) {
            meta.set(&caps[1].to_lowercase(), caps[2].trim().to_string());
            continue;
        }

        let Some((tags, body)) = split_timed_line(raw) else {
            log::trace!("Skipping unrecognised line: {}", raw);
            continue;
        };
        let Some(start) = first_tag_seconds(tags) else {
            continue;
        };
        let body = body.trim();

        let (primary, translated) = match body.split_once('|') {
            Some((left, right)) => (left.trim(), right.trim().to_string()),
            None if body.is_empty() => continue,
            None => match stacked_translation(rows.get(i).copied(), tags) {
                Some(translation) => {
                    // Строка перевода поглощена
                    i += 1;
                    (body, translation)
                }
                None => (body, String::new()),
            },
        };

        if primary.is_empty() {
            continue;
        }
        sentences.push(SentenceRecord::new(start, primary, translated));
    }

    link_end_times(&mut sentences);

    Ok(Transcript { meta, sentences })
}

/// Разделить строку содержимого на блок меток и текст
fn split_timed_line(line: &str) -> Option<(&str, &str)> {
    let caps = LINE_RE.captures(line)?;
    let tags = caps.get(1)?.as_str();
    let body = caps.get(2).map_or("", |m| m.as_str());
    Some((tags, body))
}

/// Время первой метки в секундах
fn first_tag_seconds(tags: &str) -> Option<f64> {
    let caps = TIME_RE.captures(tags)?;
    let minutes: f64 = caps[1].parse().ok()?;
    let seconds: f64 = caps[2].parse().ok()?;
    Some(minutes * 60.0 + seconds)
}

/// Перевод из следующей строки «стопочного» формата
///
/// Строка подходит, только если её блок меток совпадает посимвольно
/// и текст содержит иероглифы.
fn stacked_translation(next_row: Option<&str>, tags: &str) -> Option<String> {
    let (next_tags, next_body) = split_timed_line(next_row?.trim())?;
    let next_body = next_body.trim();
    if next_tags == tags && has_cjk(next_body) {
        Some(next_body.to_string())
    } else {
        None
    }
}

fn has_cjk(text: &str) -> bool {
    CJK_RE.is_match(text)
}

/// Конец каждого предложения - начало следующего; у последнего он неизвестен
fn link_end_times(sentences: &mut [SentenceRecord]) {
    let starts: Vec<f64> = sentences.iter().skip(1).map(|s| s.start).collect();
    for (sentence, next_start) in sentences.iter_mut().zip(starts.iter()) {
        sentence.end = Some(*next_start);
    }
    if let Some(last) = sentences.last_mut() {
        last.end = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LESSON: &str = "[al:New Concept English 1]\n\
[ar:L. G. Alexander]\n\
[ti:Excuse me!]\n\
[by:nce]\n\
[00:01.20]Lesson 1|第一课\n\
[00:05.00]Excuse me!\n\
[00:05.00]对不起！\n\
[00:07.50]Yes?\n\
[00:09.10]Is this your handbag?|这是您的手提包吗？\n";

    #[test]
    fn test_parse_metadata() {
        let transcript = parse_transcript(LESSON).unwrap();
        assert_eq!(transcript.meta.album.as_deref(), Some("New Concept English 1"));
        assert_eq!(transcript.meta.artist.as_deref(), Some("L. G. Alexander"));
        assert_eq!(transcript.meta.title.as_deref(), Some("Excuse me!"));
        assert_eq!(transcript.meta.by.as_deref(), Some("nce"));
    }

    #[test]
    fn test_metadata_keys_case_insensitive_last_wins() {
        let transcript = parse_transcript("[TI:First]\n[ti: Second ]\n[00:01]Hi").unwrap();
        assert_eq!(transcript.meta.title.as_deref(), Some("Second"));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_end_times_link_to_next_start() {
        let transcript = parse_transcript(LESSON).unwrap();
        assert_eq!(transcript.len(), 4);
        for pair in transcript.sentences.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert_eq!(pair[0].end, Some(pair[1].start));
        }
        assert_eq!(transcript.sentences[3].end, None);
    }

    #[test]
    fn test_pipe_and_stacked_fusion() {
        let transcript = parse_transcript(LESSON).unwrap();
        let s = &transcript.sentences;

        assert_eq!(s[0].primary_text, "Lesson 1");
        assert_eq!(s[0].translated_text, "第一课");

        // Вторая строка с той же меткой поглощена
        assert_eq!(s[1].start, 5.0);
        assert_eq!(s[1].primary_text, "Excuse me!");
        assert_eq!(s[1].translated_text, "对不起！");

        assert_eq!(s[2].primary_text, "Yes?");
        assert!(!s[2].has_translation());
    }

    #[test]
    fn test_pipe_and_stacked_forms_are_equivalent() {
        let piped = parse_transcript("[01:02.50]Hello|你好").unwrap();
        let stacked = parse_transcript("[01:02.50]Hello\n[01:02.50]你好").unwrap();

        assert_eq!(piped.len(), 1);
        assert_eq!(piped.sentences, stacked.sentences);
        assert_eq!(piped.sentences[0].start, 62.5);
        assert_eq!(piped.sentences[0].primary_text, "Hello");
        assert_eq!(piped.sentences[0].translated_text, "你好");
    }

    #[test]
    fn test_stacked_requires_identical_tags_and_cjk() {
        // Другая метка: две отдельные записи
        let t = parse_transcript("[00:01.00]Hello\n[00:01.0]你好").unwrap();
        assert_eq!(t.len(), 2);

        // Нет иероглифов: перевод не распознаётся
        let t = parse_transcript("[00:01.00]Hello\n[00:01.00]Hola").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.sentences[1].primary_text, "Hola");

        // Пустая строка между ними разрывает пару
        let t = parse_transcript("[00:01.00]Hello\n\n[00:01.00]你好").unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_pipe_splits_once() {
        let t = parse_transcript("[00:03]A|B|C").unwrap();
        assert_eq!(t.sentences[0].primary_text, "A");
        assert_eq!(t.sentences[0].translated_text, "B|C");
    }

    #[test]
    fn test_multiple_tags_use_first() {
        let t = parse_transcript("[00:10.5][01:20]Chorus line").unwrap();
        assert_eq!(t.sentences[0].start, 10.5);
        assert_eq!(t.sentences[0].primary_text, "Chorus line");
    }

    #[test]
    fn test_malformed_and_empty_lines_are_dropped() {
        let text = "garbage\r\n[xx:yy]nope\r\n   \r\n[00:02]\r\n[00:03]| only translation\r\n[00:04] Kept \r\n";
        let t = parse_transcript(text).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.sentences[0].primary_text, "Kept");
        assert_eq!(t.sentences[0].start, 4.0);
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(parse_transcript("  \n \n"), Err(LessonError::EmptyTranscript)));
    }

    #[test]
    fn test_load_transcript_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson.lrc");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(LESSON.as_bytes()).unwrap();

        let transcript = load_transcript(&path).unwrap();
        assert_eq!(transcript.len(), 4);

        let missing = load_transcript(dir.path().join("missing.lrc"));
        assert!(matches!(missing, Err(LessonError::TranscriptLoad { .. })));
    }
}
