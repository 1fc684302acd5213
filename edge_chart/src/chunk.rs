use crate::EdgeError;

/// Split `items` into contiguous windows of `width` elements.
///
/// The last window holds the remainder when `items.len()` is not a multiple of
/// `width`. Empty input yields no windows.
pub fn chunk<T>(items: &[T], width: usize) -> Result<Vec<&[T]>, EdgeError> {
    if width == 0 {
        return Err(EdgeError::InvalidArgument("chunk width must be > 0".into()));
    }
    Ok(items.chunks(width).collect())
}

/// Number of windows `chunk` produces for `len` items.
pub fn chunk_count(len: usize, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    len.div_ceil(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_with_short_tail() {
        let items: Vec<u32> = (0..8).collect();
        let chunks: Vec<Vec<u32>> = chunk(&items, 3)
            .unwrap()
            .into_iter()
            .map(|c| c.to_vec())
            .collect();
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7]]);
    }

    #[test]
    fn concatenation_restores_input() {
        let items: Vec<u32> = (0..97).collect();
        for width in 1..=items.len() + 3 {
            let chunks = chunk(&items, width).unwrap();
            assert_eq!(chunks.len(), chunk_count(items.len(), width));
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= width));
            let joined: Vec<u32> = chunks.concat();
            assert_eq!(joined, items);
        }
    }

    #[test]
    fn exact_multiple_has_full_last_chunk() {
        let items = [1, 2, 3, 4, 5, 6];
        let chunks = chunk(&items, 2).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], &[5, 6]);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        let items: [u8; 0] = [];
        assert!(chunk(&items, 60).unwrap().is_empty());
        assert_eq!(chunk_count(0, 60), 0);
    }

    #[test]
    fn zero_width_is_invalid() {
        let err = chunk(&[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, EdgeError::InvalidArgument(_)));
    }
}
