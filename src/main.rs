use clap::Parser;
use gptok_core::{utils, CoreConfig, Operation as CoreOperation, ParameterSet, ParameterValue};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Encode / decode BPE tokens or check token limits for a batch of JSON records",
    long_about = None,
    name = "gptok"
)]
struct CliArgs {
    #[arg(short, long, value_name = "FILE", help = "Input batch (default: stdin)")]
    input: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE", help = "Output file (default: stdout)")]
    output: Option<PathBuf>,

    #[arg(short, long, value_name = "FILE", help = "JSON node config with operation and parameters")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Operation applied to every record")]
    operation: Option<CliOperation>,

    #[arg(long, value_name = "TEXT", conflicts_with = "input_field", help = "Literal input string for every record")]
    input_string: Option<String>,

    #[arg(long, value_name = "KEY", help = "Record field holding the input string")]
    input_field: Option<String>,

    #[arg(
        long,
        value_name = "TOKENS",
        conflicts_with = "tokens_field",
        help = "Literal tokens to decode, e.g. [5661,318,1337]"
    )]
    input_tokens: Option<String>,

    #[arg(long, value_name = "KEY", help = "Record field holding the tokens to decode")]
    tokens_field: Option<String>,

    #[arg(
        long,
        value_name = "NUM",
        allow_negative_numbers = true,
        conflicts_with = "max_tokens_field",
        help = "Token limit (default: 2048)"
    )]
    max_tokens: Option<i64>,

    #[arg(long, value_name = "KEY", help = "Record field holding the token limit")]
    max_tokens_field: Option<String>,

    #[arg(long, value_name = "KEY", help = "Key to write results to (default depends on the operation)")]
    destination_key: Option<String>,

    #[arg(long, help = "Fail a record when its string exceeds the token limit")]
    error_token_limit: bool,

    #[arg(long, help = "Skip failing records instead of aborting the batch")]
    continue_on_fail: bool,

    #[arg(long, help = "Pretty-print the output JSON")]
    pretty: bool,
}

// Enum for CLI parsing layer, to keep clap attributes separate from core logic
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "camelCase")]
enum CliOperation {
    Encode,
    Decode,
    CountTokens,
    IsWithinTokenLimit,
    SliceMatchingTokenLimit,
}

// Conversion from CLI's Operation to Core's Operation
impl From<CliOperation> for CoreOperation {
    fn from(cli_op: CliOperation) -> Self {
        match cli_op {
            CliOperation::Encode => CoreOperation::Encode,
            CliOperation::Decode => CoreOperation::Decode,
            CliOperation::CountTokens => CoreOperation::CountTokens,
            CliOperation::IsWithinTokenLimit => CoreOperation::IsWithinTokenLimit,
            CliOperation::SliceMatchingTokenLimit => CoreOperation::SliceMatchingTokenLimit,
        }
    }
}

impl CliArgs {
    /// Parameters given on the command line; unset flags leave the config file value alone.
    fn parameter_overrides(&self) -> Result<ParameterSet, String> {
        let input_tokens = match (&self.input_tokens, &self.tokens_field) {
            (Some(list), _) => Some(ParameterValue::literal(utils::parse_token_list(list)?)),
            (None, Some(field)) => Some(ParameterValue::field(field)),
            (None, None) => None,
        };

        Ok(ParameterSet {
            input_string: literal_or_field(self.input_string.clone(), self.input_field.as_deref()),
            input_tokens,
            max_tokens: literal_or_field(self.max_tokens, self.max_tokens_field.as_deref()),
            destination_key: self.destination_key.clone().map(ParameterValue::literal),
            error_token_limit: self.error_token_limit.then(|| ParameterValue::literal(true)),
        })
    }
}

fn literal_or_field<T: Into<Value>>(literal: Option<T>, field: Option<&str>) -> Option<ParameterValue> {
    literal
        .map(ParameterValue::literal)
        .or_else(|| field.map(ParameterValue::field))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli_args = CliArgs::parse();
    tracing::debug!(?cli_args, "Parsed command line");

    let overrides = match cli_args.parameter_overrides() {
        Ok(overrides) => overrides,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let core_config = match CoreConfig::new_from_cli(
        cli_args.input,
        cli_args.output,
        cli_args.config,
        cli_args.operation.map(CoreOperation::from),
        overrides,
        cli_args.continue_on_fail,
        cli_args.pretty,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the core batch logic
    if let Err(e) = gptok_core::run_batch(core_config).await {
        eprintln!("Error running batch: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
