//! Table serialisation: rows of cells → bounded plain text.
//!
//! Models read pipe-separated rows reliably and the format costs almost no
//! tokens, so tables are sent as text rather than rendered to images.

/// Marker appended when text was cut at a ceiling.
pub const ELLIPSIS: &str = "...";

/// A table read from a slide: rows of cell texts in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableShape {
    pub rows: Vec<Vec<String>>,
}

impl TableShape {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(|c| c.trim().is_empty()))
    }
}

/// Serialise `table` as `" | "`-joined cells, one row per line, capped at
/// `ceiling` characters plus [`ELLIPSIS`].
pub fn serialize_table(table: &TableShape, ceiling: usize) -> String {
    let text = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.trim())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&text, ceiling)
}

/// Cut `text` to `ceiling` characters and append [`ELLIPSIS`] when it was longer.
///
/// Counts `char`s, not bytes, so multi-byte text is never split mid-character.
pub fn truncate_chars(text: &str, ceiling: usize) -> String {
    match text.char_indices().nth(ceiling) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}
