/// Rough token estimate used when no tokenizer is available: one token per
/// four UTF-16 code units, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    text.encode_utf16().count().div_ceil(4) as u64
}
