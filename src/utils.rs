//! Utility functions for the library.

/// Renders a token string for logs and reports: the quoted UTF-8 form when the
/// bytes decode cleanly, the raw byte list otherwise.
pub fn display_form(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => format!("{:?}", s),
        Err(_) => format!("{:?}", bytes),
    }
}

/// Sorts `(item, count)` pairs by descending count, breaking ties by item so
/// repeated runs over the same data produce the same order.
pub(crate) fn sort_by_count_desc<T: Ord>(pairs: &mut [(T, u64)]) {
    pairs.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}
