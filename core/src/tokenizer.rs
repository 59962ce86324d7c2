/// Split `text` into lowercase ASCII alphanumeric tokens.
///
/// A token is a maximal run of ASCII alphanumeric bytes; every other byte
/// terminates the current token. Uppercase ASCII letters fold to lowercase,
/// nothing else is normalised. Indexing, query normalisation and document
/// length all go through this one function so the BM25 length statistics
/// line up with the term matcher.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for &b in text.as_bytes() {
        if b.is_ascii_alphanumeric() {
            cur.push(b.to_ascii_lowercase() as char);
        } else if !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn keeps_digits_inside_tokens() {
        assert_eq!(tokenize("bm25 k1=1.2"), vec!["bm25", "k1", "1", "2"]);
    }

    #[test]
    fn emits_nothing_for_separator_only_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t--!! ").is_empty());
    }

    #[test]
    fn non_ascii_bytes_are_separators() {
        assert_eq!(tokenize("caf\u{e9} au lait"), vec!["caf", "au", "lait"]);
    }

    #[test]
    fn idempotent_on_its_own_output() {
        let first = tokenize("Teamcenter migration guide: map attributes!");
        let again = tokenize(&first.join(" "));
        assert_eq!(first, again);
    }
}
