//! Модуль для вычисления границ сегментов
//!
//! Сегмент предложения - полуинтервал `[start, effective_end)`.

use crate::config::SegmentSpans;
use super::types::SentenceRecord;

/// Эффективный конец сегмента
///
/// Если конец неизвестен или не больше начала, используется
/// `start + default_span`. Иначе конец не может быть ближе,
/// чем `start + min_span`.
pub fn compute_effective_end(record: &SentenceRecord, spans: &SegmentSpans) -> f64 {
    match record.end {
        Some(end) if end > record.start => end.max(record.start + spans.min_span),
        _ => record.start + spans.default_span,
    }
}

/// Индекс предложения, сегмент которого содержит момент `t`
///
/// При перекрытии сегментов побеждает первое совпадение.
pub fn find_active_index(sentences: &[SentenceRecord], t: f64, spans: &SegmentSpans) -> Option<usize> {
    sentences
        .iter()
        .position(|record| t >= record.start && t < compute_effective_end(record, spans))
}

/// Однократно проставить конец последнего предложения по длительности медиа
///
/// Возвращает `true`, если значение было изменено. Повторные вызовы
/// ничего не меняют.
pub fn on_duration_known(sentences: &mut [SentenceRecord], total_duration: f64) -> bool {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return false;
    }
    match sentences.last_mut() {
        Some(last) if last.end.is_none() => {
            last.end = Some(total_duration);
            log::debug!("Last sentence end set to media duration {:.2}s", total_duration);
            true
        }
        _ => false,
    }
}
