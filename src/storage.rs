//! Mapping linear element offsets onto physical storage.
//!
//! The sequence generator produces runs in the linearised dataset. A storage
//! layer that keeps the dataset in pieces (pages, chunks, ...) implements
//! [`OffsetResolver`], and [`resolve_runs`] cuts every run where the storage
//! stops being contiguous.

use crate::hyperslab_error::HyperslabError;
use crate::iter::Run;

/// Resolves linear element offsets to physical locations.
pub trait OffsetResolver {
    /// Physical address of one element.
    type Location;

    /// Location of the element at linear offset `elem_offset`.
    ///
    /// # Errors
    /// Implementation defined; typically `OutOfBounds` for an offset the
    /// storage does not cover.
    fn resolve(&self, elem_offset: u64) -> Result<Self::Location, HyperslabError>;

    /// Number of elements, starting at `elem_offset`, stored contiguously
    /// with it. At least 1 for any offset `resolve` accepts.
    fn contiguous_len(&self, elem_offset: u64) -> u64;
}

/// Position inside a [`PagedLayout`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PageLocation {
    /// Page index.
    pub page: u64,
    /// Element offset inside the page.
    pub offset: u64,
}

/// Dataset stored in fixed-size pages of `page_elems` elements each.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PagedLayout {
    page_elems: u64,
    total_elems: u64,
}

#[derive(serde::Deserialize)]
struct RawPagedLayout {
    page_elems: u64,
    total_elems: u64,
}

impl<'de> serde::Deserialize<'de> for PagedLayout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawPagedLayout::deserialize(deserializer)?;
        PagedLayout::new(raw.page_elems, raw.total_elems).map_err(serde::de::Error::custom)
    }
}

impl PagedLayout {
    /// # Errors
    /// `InvalidArgument` if `page_elems` is zero.
    pub fn new(page_elems: u64, total_elems: u64) -> Result<Self, HyperslabError> {
        if page_elems == 0 {
            return Err(HyperslabError::invalid("page size is zero"));
        }
        Ok(Self {
            page_elems,
            total_elems,
        })
    }

    /// Elements per page.
    #[inline]
    pub fn page_elems(&self) -> u64 {
        self.page_elems
    }

    /// Number of pages needed for the whole dataset.
    pub fn num_pages(&self) -> u64 {
        self.total_elems.div_ceil(self.page_elems)
    }
}

impl OffsetResolver for PagedLayout {
    type Location = PageLocation;

    fn resolve(&self, elem_offset: u64) -> Result<PageLocation, HyperslabError> {
        if elem_offset >= self.total_elems {
            return Err(HyperslabError::OutOfBounds {
                dim: 0,
                coord: i128::from(elem_offset),
                extent: self.total_elems,
            });
        }
        Ok(PageLocation {
            page: elem_offset / self.page_elems,
            offset: elem_offset % self.page_elems,
        })
    }

    fn contiguous_len(&self, elem_offset: u64) -> u64 {
        let to_page_end = self.page_elems - elem_offset % self.page_elems;
        to_page_end.min(self.total_elems.saturating_sub(elem_offset))
    }
}

/// Split byte `runs` into `(location, element count)` pieces that are each
/// contiguous in the resolver's storage.
///
/// # Errors
/// - `InvalidArgument` if `element_size` is zero or a run is not a whole
///   number of elements.
/// - Any error of the resolver.
pub fn resolve_runs<R: OffsetResolver>(
    runs: &[Run],
    element_size: u64,
    resolver: &R,
) -> Result<Vec<(R::Location, u64)>, HyperslabError> {
    if element_size == 0 {
        return Err(HyperslabError::invalid("element size is zero"));
    }
    let mut out = Vec::with_capacity(runs.len());
    for run in runs {
        if run.offset % element_size != 0 || run.len % element_size != 0 {
            return Err(HyperslabError::invalid(format!(
                "run {run:?} is not aligned to element size {element_size}"
            )));
        }
        let mut at = run.offset / element_size;
        let mut left = run.len / element_size;
        while left > 0 {
            let loc = resolver.resolve(at)?;
            let n = resolver.contiguous_len(at).clamp(1, left);
            out.push((loc, n));
            at += n;
            left -= n;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paged_layout_resolves() {
        let pages = PagedLayout::new(4, 10).unwrap();
        assert_eq!(pages.num_pages(), 3);
        assert_eq!(pages.resolve(5).unwrap(), PageLocation { page: 1, offset: 1 });
        assert_eq!(pages.contiguous_len(5), 3);
        assert_eq!(pages.contiguous_len(9), 1);
        assert!(pages.resolve(10).is_err());
        assert!(PagedLayout::new(0, 10).is_err());
    }

    #[test]
    fn runs_split_at_page_boundaries() {
        let pages = PagedLayout::new(4, 40).unwrap();
        let runs = [Run { offset: 8, len: 24 }, Run { offset: 56, len: 8 }];
        let got = resolve_runs(&runs, 2, &pages).unwrap();
        assert_eq!(
            got,
            vec![
                (PageLocation { page: 1, offset: 0 }, 4),
                (PageLocation { page: 2, offset: 0 }, 4),
                (PageLocation { page: 3, offset: 0 }, 4),
                (PageLocation { page: 7, offset: 0 }, 4),
            ]
        );
        assert!(resolve_runs(&[Run { offset: 1, len: 2 }], 2, &pages).is_err());
    }

    #[test]
    fn deserialize_rejects_zero_page_size() {
        let pages = PagedLayout::new(8, 100).unwrap();
        let json = serde_json::to_string(&pages).unwrap();
        assert_eq!(serde_json::from_str::<PagedLayout>(&json).unwrap(), pages);
        assert!(
            serde_json::from_str::<PagedLayout>(r#"{"page_elems":0,"total_elems":10}"#).is_err()
        );
    }
}
