//! Fixed-size, order-preserving partitioning of extracted images.

use crate::error::DeckReportError;

/// A run of consecutive items sent together in one Initial call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch<'a, T> {
    /// 0-indexed batch position.
    pub index: usize,
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    /// 1-indexed position, as shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split `items` into consecutive chunks of at most `size`.
///
/// Every chunk but the last holds exactly `size` items. An empty slice gives
/// no batches.
pub fn partition<T>(items: &[T], size: usize) -> Result<Vec<Batch<'_, T>>, DeckReportError> {
    if size == 0 {
        return Err(DeckReportError::InvalidConfig(
            "Batch size must be ≥ 1".into(),
        ));
    }
    Ok(items
        .chunks(size)
        .enumerate()
        .map(|(index, items)| Batch { index, items })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_items_in_fours() {
        let items: Vec<u32> = (1..=9).collect();
        let batches = partition(&items, 4).unwrap();
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_eq!(batches[2].items, &[9]);
        assert_eq!(batches[2].number(), 3);
    }

    #[test]
    fn concatenation_reconstructs_input() {
        for len in 0..=17 {
            let items: Vec<usize> = (0..len).collect();
            for size in 1..=6 {
                let batches = partition(&items, size).unwrap();
                let flat: Vec<usize> = batches.iter().flat_map(|b| b.items.iter().copied()).collect();
                assert_eq!(flat, items, "len={len} size={size}");
                let (last, full) = batches.split_last().map_or((None, &[][..]), |(l, f)| (Some(l), f));
                assert!(full.iter().all(|b| b.len() == size));
                if let Some(last) = last {
                    assert!(!last.is_empty() && last.len() <= size);
                }
                for (i, b) in batches.iter().enumerate() {
                    assert_eq!(b.index, i);
                }
            }
        }
    }

    #[test]
    fn empty_input_gives_no_batches() {
        let items: Vec<u8> = Vec::new();
        assert!(partition(&items, 4).unwrap().is_empty());
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = partition(&[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, DeckReportError::InvalidConfig(_)));
    }
}
