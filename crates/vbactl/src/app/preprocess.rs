//! Normalization applied to caller-submitted code before it reaches the host.

const ENTITIES: [(&str, &str); 5] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&amp;", "&"),
];

/// Unescape markup entities, then force every line terminator to CRLF.
///
/// Idempotent: `preprocess(&preprocess(s)) == preprocess(s)` for every `s`.
pub fn preprocess(code: &str) -> String {
    normalize_line_endings(&unescape_entities(code))
}

/// Replace `&amp; &lt; &gt; &quot; &apos;` with their literal characters.
///
/// Runs to a fixed point so that doubly escaped text (`&amp;lt;`) cannot survive one pass
/// and be decoded by the next.
pub fn unescape_entities(code: &str) -> String {
    let mut current = code.to_owned();
    loop {
        let mut next = current.clone();
        for (entity, literal) in ENTITIES {
            next = next.replace(entity, literal);
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Convert CRLF and lone CR to LF, then every LF to CRLF.
pub fn normalize_line_endings(code: &str) -> String {
    code.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\r\n")
}
