//! `rlm.session.create` / `rlm.session.info` / `rlm.session.close`.

use rlm_core::{Error, Result, Session, SessionConfig, SessionStatus};

use crate::engine::Engine;
use crate::types::{SessionCloseResponse, SessionCloseSummary, SessionCreateResponse, SessionInfoResponse};

/// Create a session, then charge it one unit of budget for the create call
/// itself.
pub fn create(engine: &Engine, name: Option<String>, config: Option<SessionConfig>) -> Result<SessionCreateResponse> {
    let session = Session::new(name, config.unwrap_or_default());
    engine.meta.create_session(&session)?;
    engine.meta.increment_tool_calls(&session.id)?;
    Ok(SessionCreateResponse {
        session_id: session.id,
        created_at: session.created_at,
        config: session.config,
    })
}

pub fn info(engine: &Engine, session_id: &str) -> Result<SessionInfoResponse> {
    let session = engine
        .meta
        .get_session(session_id)?
        .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
    let document_count = engine.meta.count_documents(session_id)?;
    let span_count = engine.meta.count_spans(session_id)?;
    let artifact_count = engine.meta.count_artifacts(session_id)?;
    let (total_chars, total_tokens_est) = engine.meta.get_session_stats(session_id)?;
    let tool_calls_remaining = session.config.max_tool_calls.saturating_sub(session.tool_calls_used);

    Ok(SessionInfoResponse {
        session_id: session.id.clone(),
        name: session.name,
        status: session.status,
        document_count,
        span_count,
        artifact_count,
        total_chars,
        total_tokens_est,
        tool_calls_used: session.tool_calls_used,
        tool_calls_remaining,
        index_built: engine.index_is_cached(&session.id),
        config: session.config,
    })
}

/// Session close algorithm: load, reject if not active, flip
/// to completed, compute summary, persist+evict any in-memory index, then
/// release the per-session lock entry. Runs under the session lock.
pub fn close(engine: &Engine, session_id: &str) -> Result<SessionCloseResponse> {
    engine.with_session_lock(session_id, || {
        let mut session = engine
            .meta
            .get_session(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        if session.status != SessionStatus::Active {
            return Err(Error::AlreadyClosed(session_id.to_string()));
        }

        session.status = SessionStatus::Completed;
        session.closed_at = Some(chrono::Utc::now());
        engine.meta.update_session(&session)?;

        let documents = engine.meta.count_documents(session_id)?;
        let spans = engine.meta.count_spans(session_id)?;
        let artifacts = engine.meta.count_artifacts(session_id)?;

        engine.persist_and_evict_index(session_id);

        let response = SessionCloseResponse {
            session_id: session.id.clone(),
            status: session.status,
            closed_at: session.closed_at.unwrap(),
            summary: SessionCloseSummary {
                documents,
                spans,
                artifacts,
                tool_calls: session.tool_calls_used,
            },
        };

        engine.forget_session_lock(session_id);
        Ok(response)
    })
}
