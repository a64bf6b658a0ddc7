//! `rlm-mcp` server binary: loads configuration, opens the metadata and
//! blob stores, and serves the framed stdio protocol until the client
//! closes its end.

mod config;
mod logging;
mod transport;

use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use rlm_engine::{Engine, ToolRequest};
use rlm_export::LocalDiskClient;
use rlm_storage::{BlobStore, MetaStore};
use serde_json::{json, Value};

fn config_path() -> PathBuf {
    std::env::var_os("RLM_MCP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rlm-mcp.toml"))
}

fn main() -> anyhow::Result<()> {
    let config = config::load(&config_path())?;
    logging::init(&config)?;

    config.ensure_directories()?;
    tracing::info!(data_dir = %config.data_dir.display(), "starting rlm-mcp");

    let meta = MetaStore::open(config.database_path())?;
    let blobs = BlobStore::open(config.blob_dir())?;
    // No real GitHub credentials are configured anywhere in ServerConfig yet,
    // so exports land on local disk under the data directory until a real
    // HTTP-backed client is wired in.
    let github = Arc::new(LocalDiskClient::new(config.data_dir.join("exports")));

    let engine = Engine::new(
        meta,
        blobs,
        config.index_dir(),
        config.max_file_size_mb * 1024 * 1024,
        github,
    );

    run(&engine, &mut io::stdin().lock(), &mut io::stdout().lock())
}

/// Read-dispatch-write loop: one framed request in, one framed response
/// out, until the peer closes its write half.
fn run<R: io::Read, W: io::Write>(engine: &Engine, reader: &mut R, writer: &mut W) -> anyhow::Result<()> {
    let mut reader = BufReader::new(reader);
    loop {
        let request: Option<ToolRequest> = transport::read_message(&mut reader)?;
        let Some(request) = request else {
            tracing::info!("client closed the connection");
            return Ok(());
        };

        let response = match engine.handle(request) {
            Ok(value) => value,
            Err(e) => json!({ "error": e.to_string() }),
        };

        transport::write_message(&mut *writer, &response)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn test_engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let meta = MetaStore::open(dir.path().join("meta.db")).unwrap();
        let blobs = BlobStore::open(dir.path().join("blobs")).unwrap();
        let github = Arc::new(LocalDiskClient::new(dir.path().join("exports")));
        let index_dir = dir.path().join("indexes");
        let engine = Engine::new(meta, blobs, index_dir, 50 * 1024 * 1024, github);
        (engine, dir)
    }

    fn frame(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        transport::write_message(&mut buf, value).unwrap();
        buf
    }

    #[test]
    fn serves_one_request_and_stops_on_eof() {
        let (engine, _dir) = test_engine();
        let request = json!({"tool": "rlm.session.create", "name": "test", "config": null});
        let mut input = Cursor::new(frame(&request));
        let mut output = Vec::new();

        run(&engine, &mut input, &mut output).unwrap();

        let mut cursor = Cursor::new(output);
        let response: Value = transport::read_message(&mut cursor).unwrap().unwrap();
        assert!(response.get("session_id").is_some());
    }

    #[test]
    fn malformed_tool_name_is_reported_as_an_error_response_not_a_crash() {
        let (engine, _dir) = test_engine();
        let request = json!({"tool": "rlm.nonexistent.op"});
        let mut input = Cursor::new(frame(&request));
        let mut output = Vec::new();

        // The JSON body deserializes into the wrong enum variant, which
        // `read_message` itself turns into a `Serialization` error before
        // the engine ever sees it.
        let result = run(&engine, &mut input, &mut output);
        assert!(result.is_err());
    }
}
