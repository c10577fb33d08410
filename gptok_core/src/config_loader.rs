// gptok_core/src/config_loader.rs
// Loads the node configuration (operation + parameters) from a JSON file.

use crate::error::{Error, Result};
use crate::operations::Operation;
use crate::params::ParameterSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// On-disk form of a batch configuration.
///
/// ```json
/// {
///   "operation": "sliceMatchingTokenLimit",
///   "inputString": { "field": "body" },
///   "maxTokens": 512,
///   "destinationKey": "chunks",
///   "continueOnFail": true
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    pub operation: Operation,
    #[serde(flatten)]
    pub parameters: ParameterSet,
    pub continue_on_fail: bool,
}

pub fn load_node_config_from_path(path: &Path) -> Result<NodeConfig> {
    let content = fs::read_to_string(path)?;
    let config: NodeConfig = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse node config '{}': {}",
            path.display(),
            e
        ))
    })?;
    debug!(operation = %config.operation, "Loaded node config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterValue;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_node_config_valid() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"{{
                "operation": "isWithinTokenLimit",
                "inputString": {{"field": "body"}},
                "maxTokens": 100,
                "errorTokenLimit": true,
                "continueOnFail": true
            }}"#
        )?;
        file.flush()?;

        let config = load_node_config_from_path(file.path())?;
        assert_eq!(config.operation, Operation::IsWithinTokenLimit);
        assert!(config.continue_on_fail);
        assert_eq!(
            config.parameters.input_string,
            Some(ParameterValue::field("body"))
        );
        assert_eq!(
            config.parameters.max_tokens,
            Some(ParameterValue::literal(100))
        );
        assert_eq!(
            config.parameters.error_token_limit,
            Some(ParameterValue::literal(true))
        );
        assert_eq!(config.parameters.destination_key, None);
        Ok(())
    }

    #[test]
    fn test_load_node_config_empty_object_uses_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{{}}")?;
        file.flush()?;

        let config = load_node_config_from_path(file.path())?;
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.operation, Operation::Encode);
        Ok(())
    }

    #[test]
    fn test_load_node_config_unknown_operation() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"operation": "tokenize"}}"#).unwrap();
        file.flush().unwrap();

        let result = load_node_config_from_path(file.path());
        match result {
            Err(Error::Config(message)) => assert!(message.contains("Failed to parse node config")),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_node_config_file_not_found() {
        let result = load_node_config_from_path(Path::new("this_file_should_not_exist.json"));
        match result {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }
}
