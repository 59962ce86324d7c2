/// Window size of an extract, in bytes.
const WINDOW_BYTES: usize = 120;

/// Extract a window of `text` around the earliest occurrence of any of
/// `terms`.
///
/// Matching is plain byte-string search over an ASCII-lowercased copy; the
/// emitted slice comes from the original text with case preserved. The
/// window starts a third of [`WINDOW_BYTES`] before the hit (clamped to the
/// start of the text). When no term occurs the head of the document is
/// returned. Window edges may fall inside a multi-byte sequence; those
/// edge bytes are replaced rather than panicking on them.
pub fn make_snippet(text: &str, terms: &[String]) -> String {
    let bytes = text.as_bytes();
    let lower = bytes.to_ascii_lowercase();

    let mut best: Option<usize> = None;
    for term in terms {
        if term.is_empty() {
            continue;
        }
        let needle = term.as_bytes().to_ascii_lowercase();
        if let Some(pos) = find(&lower, &needle) {
            best = Some(best.map_or(pos, |b| b.min(pos)));
        }
    }

    let (start, end) = match best {
        Some(pos) => {
            let start = pos.saturating_sub(WINDOW_BYTES / 3);
            (start, (start + WINDOW_BYTES).min(bytes.len()))
        }
        None => (0, WINDOW_BYTES.min(bytes.len())),
    };
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
