// gptok_core/src/utils.rs
// Common utility functions.

/// Parses a human-written token list such as `[5661,318,1337]` or `5661 318 1337`.
///
/// Brackets are optional; IDs may be separated by commas and/or whitespace.
pub fn parse_token_list(s: &str) -> Result<Vec<u32>, String> {
    let trimmed = s.trim();
    let inner = match (trimmed.strip_prefix('['), trimmed.strip_suffix(']')) {
        (Some(_), Some(_)) => &trimmed[1..trimmed.len() - 1],
        (None, None) => trimmed,
        _ => return Err(format!("Unbalanced brackets in token list: '{}'", trimmed)),
    };

    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| format!("Invalid token ID: '{}'", part))
        })
        .collect()
}
