use crate::events::{TranscriptKind, TranscriptMessage, TranscriptUpdate};

/// Fold one transcript event into the conversation log.
///
/// Same-speaker partial runs collapse into a single visible line, and a
/// final that re-sends the text already showing on the last line is
/// dropped. The platform habitually commits the last partial by re-sending
/// it as a final with identical text; without the drop rule every
/// utterance would appear twice.
///
/// Everything else appends. Arrival order is preserved; entries are never
/// reordered or batched across roles.
pub fn apply_transcript(log: &mut Vec<TranscriptMessage>, update: TranscriptUpdate) {
    let is_partial = update.kind == TranscriptKind::Partial;

    if let Some(last) = log.last_mut() {
        if last.role == update.role && last.is_partial {
            last.content = update.transcript;
            last.is_partial = is_partial;
            return;
        }
        if !is_partial && last.content == update.transcript {
            return;
        }
    }

    log.push(TranscriptMessage {
        role: update.role,
        content: update.transcript,
        is_partial,
    });
}
