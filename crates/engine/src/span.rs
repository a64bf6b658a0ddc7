//! `rlm.span.get`.

use rlm_core::{Error, Result};

use crate::engine::Engine;
use crate::types::{SpanGetResponse, SpanOut};

/// Fetch the content of each requested span, in order, truncating the
/// *last* included span to the session's `max_chars_per_response` cap
/// and omitting everything after it. Each returned span's
/// content is exactly `blobs.get_slice(document.content_hash, start, end)`,
/// possibly shortened.
pub fn get(engine: &Engine, session_id: &str, span_ids: Vec<String>) -> Result<SpanGetResponse> {
    let session = engine.require_session(session_id)?;
    let cap = session.config.max_chars_per_response;

    let mut spans_out = Vec::with_capacity(span_ids.len());
    let mut total_chars_returned = 0usize;

    for span_id in span_ids {
        let remaining = cap.saturating_sub(total_chars_returned);
        if remaining == 0 {
            break;
        }

        let (span, doc) = engine.require_span(session_id, &span_id)?;
        let content = engine
            .blobs
            .get_slice(&doc.content_hash, span.start_offset, Some(span.end_offset))?
            .ok_or_else(|| Error::ContentMissing(doc.content_hash.clone()))?;

        let full_len = content.chars().count();
        let (content, truncated) = if full_len > remaining {
            (content.chars().take(remaining).collect::<String>(), true)
        } else {
            (content, false)
        };
        total_chars_returned += content.chars().count();

        spans_out.push(SpanOut {
            span_id: span.id,
            doc_id: span.document_id,
            start: span.start_offset,
            end: span.end_offset,
            content,
            content_hash: span.content_hash,
            truncated,
        });

        if truncated {
            break;
        }
    }

    Ok(SpanGetResponse { spans: spans_out, total_chars_returned })
}
