//! Page ring arithmetic.
//!
//! The sensor stores its log in a fixed ring of [`RING_SIZE`] pages that
//! overwrites the oldest page once full. All positions are modulo the ring
//! size, and a range whose start lies after its end wraps through page 0.

use crate::error::{ParseError, ParseResult};

/// Number of pages in the device ring.
pub const RING_SIZE: u16 = 2048;

/// Highest valid page number.
pub const MAX_PAGE: u16 = RING_SIZE - 1;

/// Rows stored in one page.
pub const ROWS_PER_PAGE: u8 = 13;

/// Index of the last row of a complete page.
pub const LAST_ROW: u8 = ROWS_PER_PAGE - 1;

/// Check that a page number lies inside the ring.
pub fn check_page(page: u16) -> ParseResult<u16> {
    if page > MAX_PAGE {
        return Err(ParseError::PageOutOfRange(page));
    }
    Ok(page)
}

/// Check that a row index lies inside a page.
pub fn check_row(row: u8) -> ParseResult<u8> {
    if row > LAST_ROW {
        return Err(ParseError::RowOutOfRange(row));
    }
    Ok(row)
}

/// The page that follows `page` in the ring.
#[must_use]
pub fn next_page(page: u16) -> u16 {
    (page + 1) % RING_SIZE
}

/// The page that precedes `page` in the ring.
#[must_use]
pub fn prev_page(page: u16) -> u16 {
    (page + RING_SIZE - 1) % RING_SIZE
}

/// Number of pages visited going from `start` to `end` inclusive.
///
/// Always in `1..=RING_SIZE`. A full revolution (`start == end + 1`) counts
/// as the whole ring.
///
/// # Errors
///
/// Returns [`ParseError::PageOutOfRange`] if either endpoint is outside the ring.
pub fn page_distance(start: u16, end: u16) -> ParseResult<usize> {
    check_page(start)?;
    check_page(end)?;
    Ok(usize::from((end + RING_SIZE - start) % RING_SIZE) + 1)
}

/// Expand `[start, end]` into the ordered page sequence for a scan.
///
/// ```
/// use envsensor_types::ring::expand_range;
///
/// let pages: Vec<u16> = expand_range(2045, 3).unwrap().collect();
/// assert_eq!(pages, vec![2045, 2046, 2047, 0, 1, 2, 3]);
/// ```
///
/// # Errors
///
/// Returns [`ParseError::PageOutOfRange`] if either endpoint is outside the ring.
pub fn expand_range(start: u16, end: u16) -> ParseResult<PageRange> {
    let len = page_distance(start, end)?;
    Ok(PageRange {
        start,
        end,
        next: start,
        remaining: len,
    })
}

/// Ordered, restartable sequence of ring pages.
///
/// Produced by [`expand_range`]. Cloning yields an independent iterator
/// starting wherever the source iterator currently is; [`PageRange::restart`]
/// rewinds to the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRange {
    start: u16,
    end: u16,
    next: u16,
    remaining: usize,
}

impl PageRange {
    /// First page of the range.
    #[must_use]
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Last page of the range (inclusive).
    #[must_use]
    pub fn end(&self) -> u16 {
        self.end
    }

    /// Whether this range wraps through page 0.
    #[must_use]
    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// A fresh iterator over the same range.
    #[must_use]
    pub fn restart(&self) -> PageRange {
        PageRange {
            start: self.start,
            end: self.end,
            next: self.start,
            remaining: usize::from((self.end + RING_SIZE - self.start) % RING_SIZE) + 1,
        }
    }
}

impl Iterator for PageRange {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        let page = self.next;
        self.next = next_page(page);
        self.remaining -= 1;
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PageRange {}

impl std::iter::FusedIterator for PageRange {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_range_wraps_through_zero() {
        let pages: Vec<u16> = expand_range(2045, 3).unwrap().collect();
        assert_eq!(pages, vec![2045, 2046, 2047, 0, 1, 2, 3]);
    }

    #[test]
    fn test_expand_range_ascending() {
        let pages: Vec<u16> = expand_range(11, 15).unwrap().collect();
        assert_eq!(pages, vec![11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_expand_range_single_page() {
        let pages: Vec<u16> = expand_range(7, 7).unwrap().collect();
        assert_eq!(pages, vec![7]);
    }

    #[test]
    fn test_page_distance_edge_cases() {
        assert_eq!(page_distance(2046, 1).unwrap(), 4);
        assert_eq!(page_distance(0, 2047).unwrap(), 2048);
        assert_eq!(page_distance(1, 0).unwrap(), 2048);
        assert_eq!(page_distance(5, 5).unwrap(), 1);
    }

    #[test]
    fn test_out_of_range_page_rejected() {
        assert_eq!(
            expand_range(2048, 3).unwrap_err(),
            ParseError::PageOutOfRange(2048)
        );
        assert_eq!(
            page_distance(0, 4000).unwrap_err(),
            ParseError::PageOutOfRange(4000)
        );
    }

    #[test]
    fn test_restart_rewinds() {
        let mut range = expand_range(2046, 1).unwrap();
        assert_eq!(range.next(), Some(2046));
        assert_eq!(range.next(), Some(2047));
        let again: Vec<u16> = range.restart().collect();
        assert_eq!(again, vec![2046, 2047, 0, 1]);
        assert!(range.wraps());
    }

    #[test]
    fn test_next_and_prev_page() {
        assert_eq!(next_page(2047), 0);
        assert_eq!(prev_page(0), 2047);
        assert_eq!(next_page(prev_page(100)), 100);
    }

    #[test]
    fn test_check_row() {
        assert!(check_row(12).is_ok());
        assert_eq!(check_row(13).unwrap_err(), ParseError::RowOutOfRange(13));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The expanded sequence has exactly `page_distance` entries.
        #[test]
        fn expand_range_len_matches_distance(start in 0u16..RING_SIZE, end in 0u16..RING_SIZE) {
            let pages: Vec<u16> = expand_range(start, end).unwrap().collect();
            prop_assert_eq!(pages.len(), page_distance(start, end).unwrap());
        }

        /// Each page is the ring successor of the one before it.
        #[test]
        fn expand_range_is_contiguous(start in 0u16..RING_SIZE, end in 0u16..RING_SIZE) {
            let pages: Vec<u16> = expand_range(start, end).unwrap().collect();
            prop_assert_eq!(pages[0], start);
            prop_assert_eq!(*pages.last().unwrap(), end);
            for pair in pages.windows(2) {
                prop_assert_eq!(pair[1], next_page(pair[0]));
            }
        }

        /// Non-wrapping ranges are strictly ascending, wrapping ones split once at 0.
        #[test]
        fn expand_range_follows_wrap_rule(start in 0u16..RING_SIZE, end in 0u16..RING_SIZE) {
            let pages: Vec<u16> = expand_range(start, end).unwrap().collect();
            let descents = pages.windows(2).filter(|w| w[1] < w[0]).count();
            if start <= end {
                prop_assert_eq!(descents, 0);
            } else {
                prop_assert_eq!(descents, 1);
            }
        }

        /// A single-page range yields exactly that page.
        #[test]
        fn expand_range_single(page in 0u16..RING_SIZE) {
            let pages: Vec<u16> = expand_range(page, page).unwrap().collect();
            prop_assert_eq!(pages, vec![page]);
        }

        /// Distance never exceeds the ring.
        #[test]
        fn page_distance_bounded(start in 0u16..RING_SIZE, end in 0u16..RING_SIZE) {
            let d = page_distance(start, end).unwrap();
            prop_assert!((1..=usize::from(RING_SIZE)).contains(&d));
        }
    }
}
