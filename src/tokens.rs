use lazy_static::lazy_static;
use tiktoken_rs::CoreBPE;

lazy_static! {
    static ref CL100K: Option<CoreBPE> = match tiktoken_rs::cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(e) => {
            log::warn!("cl100k_base encoding unavailable, estimating tokens: {}", e);
            None
        }
    };
}

/// Token count of `text` under the `cl100k_base` encoding, or the usual
/// four-characters-per-token estimate when the encoding cannot be loaded.
pub fn count_tokens(text: &str) -> usize {
    match CL100K.as_ref() {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => estimate_tokens(text),
    }
}

#[inline]
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
