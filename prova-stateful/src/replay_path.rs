//! Compact textual encoding of replay paths.
//!
//! A replay path holds one bit per command slot met while shrinking a command sequence:
//! whether that command actually ran. The path is run-length encoded. The first half of
//! the token lists the run lengths (`length - 1`, at most 64 per run), the second half
//! packs the value of each run, six runs per character, least significant bit first.
//! Both halves use the base64 alphabet and are joined by `:`.

use prova::ArbitraryError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Longest run a single count character can express
const MAX_RUN: usize = 64;

/// Prefix of the replay token shown in failure reports
pub const TOKEN_PREFIX: &str = "replayPath=";

fn to_b64(n: usize) -> char {
    ALPHABET[n] as char
}

fn from_b64(c: char, token: &str) -> Result<usize, ArbitraryError> {
    ALPHABET
        .iter()
        .position(|&a| a as char == c)
        .ok_or_else(|| invalid(token, format!("unexpected character {:?}", c)))
}

fn invalid(token: &str, reason: impl Into<String>) -> ArbitraryError {
    ArbitraryError::InvalidReplayPath {
        token: token.to_string(),
        reason: reason.into(),
    }
}

fn runs(path: &[bool]) -> Vec<(bool, usize)> {
    let mut runs: Vec<(bool, usize)> = Vec::new();
    for &bit in path {
        match runs.last_mut() {
            Some((value, count)) if *value == bit && *count < MAX_RUN => *count += 1,
            _ => runs.push((bit, 1)),
        }
    }
    runs
}

/// Encode a replay path
pub fn stringify(path: &[bool]) -> String {
    let runs = runs(path);
    let counts: String = runs.iter().map(|(_, count)| to_b64(count - 1)).collect();
    let values: String = runs
        .chunks(6)
        .map(|chunk| {
            let packed = chunk
                .iter()
                .rev()
                .fold(0, |packed, (value, _)| packed * 2 + usize::from(*value));
            to_b64(packed)
        })
        .collect();
    format!("{}:{}", counts, values)
}

/// Decode a replay path produced by [`stringify`]
pub fn parse(token: &str) -> Result<Vec<bool>, ArbitraryError> {
    let (counts, values) = token
        .split_once(':')
        .ok_or_else(|| invalid(token, "missing ':' separator"))?;
    let mut bits = Vec::new();
    for c in values.chars() {
        let mut packed = from_b64(c, token)?;
        for _ in 0..6 {
            bits.push(packed % 2 == 1);
            packed >>= 1;
        }
    }
    let mut path = Vec::new();
    for (index, c) in counts.chars().enumerate() {
        let count = from_b64(c, token)? + 1;
        let value = bits
            .get(index)
            .copied()
            .ok_or_else(|| invalid(token, "fewer values than counts"))?;
        path.extend(std::iter::repeat_n(value, count));
    }
    Ok(path)
}

/// Render the replay token of a path: `replayPath="<compact path>"`
pub fn to_token(path: &[bool]) -> String {
    let quoted = serde_json::Value::String(stringify(path));
    format!("{}{}", TOKEN_PREFIX, quoted)
}

/// Extract the compact path from a replay token, accepting the bare compact form too
pub fn from_token(token: &str) -> Result<String, ArbitraryError> {
    let token = token.trim();
    let Some(quoted) = token.strip_prefix(TOKEN_PREFIX) else {
        return Ok(token.to_string());
    };
    serde_json::from_str::<String>(quoted).map_err(|error| invalid(token, error.to_string()))
}
