pub mod http;

/// Telegram rejects messages over 4096 characters.
pub const MESSAGE_CHUNK_LIMIT: usize = 4000;

/// Splits `text` into chunks of at most `limit` characters, cutting after the
/// last sentence end in the window when it falls in the second half.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let hard = match rest.char_indices().nth(limit) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest.to_string());
                break;
            }
        };

        let cut = rest[..hard]
            .char_indices()
            .filter(|(_, c)| matches!(c, '.' | '!' | '?' | '\n'))
            .map(|(idx, c)| idx + c.len_utf8())
            .last()
            .filter(|&idx| idx > hard / 2)
            .unwrap_or(hard);

        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    chunks
}
