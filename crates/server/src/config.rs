//! Loads `rlm_core::ServerConfig` from a TOML file on disk. Not a hardened
//! config layer: a missing file falls back to defaults, and a malformed one
//! surfaces the `toml` crate's own parse error.

use std::path::Path;

use rlm_core::ServerConfig;

/// Read and parse `path` into a `ServerConfig`. A missing file is not an
/// error — it yields `ServerConfig::default()`, so a fresh install can run
/// without first being handed a config file.
pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
    if !path.exists() {
        return Ok(ServerConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&text)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load(Path::new("/nonexistent/rlm-mcp.toml")).unwrap();
        assert_eq!(config.default_max_tool_calls, 500);
    }

    #[test]
    fn parses_overridden_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"default_max_tool_calls = 100"#).unwrap();
        writeln!(file, r#"log_level = "debug""#).unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.default_max_tool_calls, 100);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml [[[").unwrap();
        assert!(load(file.path()).is_err());
    }
}
