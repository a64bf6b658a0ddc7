//! `rlm.artifact.store` / `rlm.artifact.list` / `rlm.artifact.get`.

use chrono::Utc;
use serde_json::Value;

use rlm_core::{generate_id, Artifact, ArtifactProvenance, ChunkStrategy, Error, Result, Span, SpanRef};

use crate::engine::Engine;
use crate::types::{ArtifactGetResponse, ArtifactListResponse, ArtifactOut, ArtifactStoreResponse};

/// Store an artifact bound either to an existing `span_id` or to an inline
/// `span` reference. A span reference is materialized into a
/// real, persisted span with strategy `manual` before the artifact is
/// created. Any span, provided or resolved, is validated to belong to the
/// current session by walking span -> document -> session
/// (`Engine::require_span`); a mismatch is a hard `cross_session_reference`
/// error.
pub fn store(
    engine: &Engine,
    session_id: &str,
    kind: String,
    content: Value,
    span_id: Option<String>,
    span: Option<SpanRef>,
    provenance: Option<ArtifactProvenance>,
) -> Result<ArtifactStoreResponse> {
    engine.require_session(session_id)?;

    let resolved_span_id = match (span_id, span) {
        (Some(id), _) => {
            engine.require_span(session_id, &id)?;
            Some(id)
        }
        (None, Some(span_ref)) => {
            let doc = engine.require_document(session_id, &span_ref.doc_id)?;
            let slice = engine
                .blobs
                .get_slice(&doc.content_hash, span_ref.start, Some(span_ref.end))?
                .ok_or_else(|| Error::ContentMissing(doc.content_hash.clone()))?;
            let content_hash = engine.blobs.put(&slice)?;
            let new_span = Span {
                id: generate_id(),
                document_id: doc.id,
                start_offset: span_ref.start,
                end_offset: span_ref.end,
                content_hash,
                strategy: ChunkStrategy::Manual,
                created_at: Utc::now(),
            };
            engine.meta.create_span(&new_span)?;
            Some(new_span.id)
        }
        (None, None) => None,
    };

    let artifact = Artifact {
        id: generate_id(),
        session_id: session_id.to_string(),
        span_id: resolved_span_id.clone(),
        kind,
        content,
        provenance,
        created_at: Utc::now(),
    };
    engine.meta.create_artifact(&artifact)?;

    Ok(ArtifactStoreResponse { artifact_id: artifact.id, span_id: resolved_span_id })
}

pub fn list(
    engine: &Engine,
    session_id: &str,
    span_id: Option<String>,
    kind: Option<String>,
) -> Result<ArtifactListResponse> {
    engine.require_session(session_id)?;
    let artifacts = engine.meta.get_artifacts(session_id, span_id.as_deref(), kind.as_deref())?;
    Ok(ArtifactListResponse {
        artifacts: artifacts
            .into_iter()
            .map(|a| ArtifactOut {
                artifact_id: a.id,
                kind: a.kind,
                content: a.content,
                span_id: a.span_id,
                provenance: a.provenance,
                created_at: a.created_at,
            })
            .collect(),
    })
}

/// `rlm.artifact.get` additionally materializes the referenced span, if
/// any, into an embedded `{doc_id, start, end}` triple so the caller does
/// not need a second round-trip.
pub fn get(engine: &Engine, session_id: &str, artifact_id: &str) -> Result<ArtifactGetResponse> {
    engine.require_session(session_id)?;
    let artifact = engine
        .meta
        .get_artifact(artifact_id)?
        .ok_or_else(|| Error::ArtifactNotFound(artifact_id.to_string()))?;
    if artifact.session_id != session_id {
        return Err(Error::CrossSessionReference(format!(
            "artifact {artifact_id} belongs to a different session"
        )));
    }

    let span = match &artifact.span_id {
        Some(sid) => {
            let (span, _doc) = engine.require_span(session_id, sid)?;
            Some(span.to_ref())
        }
        None => None,
    };

    Ok(ArtifactGetResponse {
        artifact_id: artifact.id,
        kind: artifact.kind,
        content: artifact.content,
        provenance: artifact.provenance,
        span,
        created_at: artifact.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs;
    use crate::session;
    use crate::test_support::test_engine;
    use crate::types::LoadSource;

    fn load_one(engine: &Engine, sid: &str, content: &str) -> String {
        docs::load(engine, sid, vec![LoadSource::Inline { content: content.to_string(), token_count_hint: None }])
            .unwrap()
            .loaded[0]
            .doc_id
            .clone()
    }

    #[test]
    fn store_with_span_reference_materializes_a_manual_span() {
        let engine = test_engine();
        let sid = session::create(&engine, None, None).unwrap().session_id;
        let doc_id = load_one(&engine, &sid, "hello world");

        let resp = store(
            &engine,
            &sid,
            "summary".into(),
            serde_json::json!({"text": "hi"}),
            None,
            Some(SpanRef { doc_id, start: 0, end: 5 }),
            Some(ArtifactProvenance { model: Some("x".into()), ..Default::default() }),
        )
        .unwrap();
        assert!(resp.span_id.is_some());

        let fetched = get(&engine, &sid, &resp.artifact_id).unwrap();
        assert_eq!(fetched.kind, "summary");
        assert_eq!(fetched.span.unwrap().end, 5);
    }

    #[test]
    fn get_rejects_cross_session_artifact() {
        let engine = test_engine();
        let s1 = session::create(&engine, None, None).unwrap().session_id;
        let s2 = session::create(&engine, None, None).unwrap().session_id;
        let doc_id = load_one(&engine, &s1, "content");

        let resp = store(
            &engine,
            &s1,
            "note".into(),
            serde_json::json!({}),
            None,
            Some(SpanRef { doc_id, start: 0, end: 3 }),
            None,
        )
        .unwrap();

        let err = get(&engine, &s2, &resp.artifact_id).unwrap_err();
        assert!(matches!(err, Error::CrossSessionReference(_)));
    }

    #[test]
    fn session_level_artifact_has_no_span() {
        let engine = test_engine();
        let sid = session::create(&engine, None, None).unwrap().session_id;
        let resp = store(&engine, &sid, "note".into(), serde_json::json!({"k": "v"}), None, None, None).unwrap();
        assert!(resp.span_id.is_none());
        let fetched = get(&engine, &sid, &resp.artifact_id).unwrap();
        assert!(fetched.span.is_none());
    }
}
