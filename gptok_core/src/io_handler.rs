// gptok_core/src/io_handler.rs
// Handles input/output of record batches, from files or stdin/stdout.

use crate::error::Result;
use crate::record::Record;
use crate::CoreConfig;
use serde_json::Value;
use std::path::Path;
use tokio::fs::File as TokioFile;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader as TokioBufReader,
    BufWriter as TokioBufWriter,
};
use tracing::debug;

// Type aliases for convenience
pub type InputReader = Box<dyn AsyncRead + Unpin + Send>;
pub type OutputWriter = Box<dyn AsyncWrite + Unpin + Send>;

pub async fn setup_input_reader(input: Option<&Path>) -> Result<InputReader> {
    match input {
        Some(path) => {
            let file = TokioFile::open(path).await?;
            Ok(Box::new(TokioBufReader::new(file)))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

pub async fn setup_output_writer(output: Option<&Path>) -> Result<OutputWriter> {
    match output {
        Some(path) => {
            let file = TokioFile::create(path).await?;
            Ok(Box::new(TokioBufWriter::new(file)))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Reads the whole input and parses it into records.
pub async fn read_batch(config: &CoreConfig) -> Result<Vec<Record>> {
    let mut reader = setup_input_reader(config.input.as_deref()).await?;
    let mut content = String::new();
    reader.read_to_string(&mut content).await?;
    parse_batch(&content)
}

/// Serializes `records` as a JSON array and flushes the output.
pub async fn write_batch(config: &CoreConfig, records: &[Record]) -> Result<()> {
    let mut writer = setup_output_writer(config.output.as_deref()).await?;
    let mut bytes = if config.pretty {
        serde_json::to_vec_pretty(records)?
    } else {
        serde_json::to_vec(records)?
    };
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Accepts a JSON array of items, a single item, or whitespace-separated
/// items (JSON Lines). A lone top-level array is unpacked into its elements.
/// Items may be bare payloads or records in the written `{"json": ...}` form.
pub fn parse_batch(content: &str) -> Result<Vec<Record>> {
    let values = serde_json::Deserializer::from_str(content)
        .into_iter::<Value>()
        .collect::<serde_json::Result<Vec<_>>>()?;

    let items = match <[Value; 1]>::try_from(values) {
        Ok([Value::Array(items)]) => items,
        Ok([single]) => vec![single],
        Err(values) => values,
    };
    debug!(items = items.len(), "Parsed input batch");
    Ok(items.into_iter().map(Record::from_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn payloads(records: &[Record]) -> Vec<Value> {
        records
            .iter()
            .map(|r| Value::Object(r.json.clone()))
            .collect()
    }

    #[test]
    fn test_parse_batch_array() -> Result<()> {
        let records = parse_batch(r#"[{"text": "a"}, {"text": "b"}]"#)?;
        assert_eq!(payloads(&records), vec![json!({"text": "a"}), json!({"text": "b"})]);
        Ok(())
    }

    #[test]
    fn test_parse_batch_single_object() -> Result<()> {
        let records = parse_batch(r#"{"text": "only"}"#)?;
        assert_eq!(payloads(&records), vec![json!({"text": "only"})]);
        Ok(())
    }

    #[test]
    fn test_parse_batch_json_lines() -> Result<()> {
        let records = parse_batch("{\"text\": \"a\"}\n{\"text\": \"b\"}\n\"bare\"\n")?;
        assert_eq!(
            payloads(&records),
            vec![json!({"text": "a"}), json!({"text": "b"}), json!({"data": "bare"})]
        );
        Ok(())
    }

    #[test]
    fn test_parse_batch_empty_input() -> Result<()> {
        assert!(parse_batch("")?.is_empty());
        assert!(parse_batch("  \n")?.is_empty());
        assert!(parse_batch("[]")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_batch_accepts_written_output() -> Result<()> {
        let records = parse_batch(r#"[{"text": "a"}, {"text": "b"}]"#)?;
        let written = serde_json::to_string(&records)?;
        assert_eq!(written, r#"[{"json":{"text":"a"}},{"json":{"text":"b"}}]"#);

        let reread = parse_batch(&written)?;
        assert_eq!(payloads(&reread), payloads(&records));
        Ok(())
    }

    #[test]
    fn test_parse_batch_invalid_json() {
        assert!(parse_batch("[{\"text\": ").is_err());
    }

    #[tokio::test]
    async fn test_read_and_write_batch_files() -> Result<()> {
        let mut input = NamedTempFile::new()?;
        write!(input, r#"[{{"text": "hello"}}]"#)?;
        input.flush()?;
        let output = NamedTempFile::new()?.into_temp_path();

        let config = CoreConfig {
            input: Some(input.path().to_path_buf()),
            output: Some(output.to_path_buf()),
            ..Default::default()
        };

        let records = read_batch(&config).await?;
        assert_eq!(records.len(), 1);
        write_batch(&config, &records).await?;

        let written = tokio::fs::read_to_string(&output).await?;
        assert_eq!(written, "[{\"json\":{\"text\":\"hello\"}}]\n");
        Ok(())
    }
}
