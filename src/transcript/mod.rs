//! Модуль для работы с транскриптами уроков
//!
//! Содержит парсер формата с временными метками (`[мм:сс.xx]текст`)
//! и индекс сегментов, отвечающий на вопрос «какое предложение звучит сейчас».

pub mod types;
pub mod parser;
pub mod segment;

pub use types::{SentenceRecord, Transcript, TranscriptMeta};
pub use parser::{load_transcript, parse_transcript};
pub use segment::{compute_effective_end, find_active_index, on_duration_known};
