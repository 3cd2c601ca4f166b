//! Fill, gather and scatter of selected elements in a dataset buffer.
//!
//! A dataset buffer holds every element of the selection's extent in
//! row-major order. Each algorithm drains a fresh iterator in batches bounded
//! by [`IoConfig`], with element size 1 so that runs are element ranges.

use crate::config::IoConfig;
use crate::hyperslab_error::HyperslabError;
use crate::iter::Run;
use crate::selection::Selection;
use std::ops::{ControlFlow, Range};

fn expect_len(found: usize, expected: u64) -> Result<(), HyperslabError> {
    if found as u64 == expected {
        Ok(())
    } else {
        Err(HyperslabError::BufferLengthMismatch {
            expected,
            found: found as u64,
        })
    }
}

#[inline]
fn span(run: &Run) -> Range<usize> {
    // buffer length equals the extent size, so runs fit in usize
    run.offset as usize..(run.offset + run.len) as usize
}

/// Call `f` with every batch of element runs of `sel`, in order.
fn drain_runs<F>(sel: &Selection, cfg: &IoConfig, mut f: F) -> Result<ControlFlow<()>, HyperslabError>
where
    F: FnMut(&[Run]) -> ControlFlow<()>,
{
    cfg.validate()?;
    let mut it = sel.iter(1)?;
    let mut runs = Vec::new();
    while it.elements_left() > 0 {
        it.next_runs_into(cfg.max_runs, cfg.max_elements, &mut runs);
        if f(&runs).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// [`drain_runs`] for callers that always consume every batch.
fn drain_all_runs<F>(sel: &Selection, cfg: &IoConfig, mut f: F) -> Result<(), HyperslabError>
where
    F: FnMut(&[Run]),
{
    drain_runs(sel, cfg, |runs| {
        f(runs);
        ControlFlow::Continue(())
    })
    .map(|_| ())
}

/// Set every selected element of `data` to `value`. Returns the number of
/// elements written.
///
/// # Errors
/// - `BufferLengthMismatch` if `data` does not hold the whole extent.
/// - Any error of [`Selection::iter`] or [`IoConfig::validate`].
pub fn fill<T: Clone>(
    sel: &Selection,
    value: &T,
    data: &mut [T],
    cfg: &IoConfig,
) -> Result<u64, HyperslabError> {
    expect_len(data.len(), sel.extent().num_elements())?;
    drain_all_runs(sel, cfg, |runs| {
        for run in runs {
            data[span(run)].fill(value.clone());
        }
    })?;
    Ok(sel.num_elements())
}

/// Copy the selected elements of `data` into a packed vector, in row-major
/// order.
///
/// # Errors
/// - `BufferLengthMismatch` if `data` does not hold the whole extent.
/// - `AllocationFailure` if the packed vector cannot be reserved.
/// - Any error of [`Selection::iter`] or [`IoConfig::validate`].
pub fn gather<T: Clone>(sel: &Selection, data: &[T], cfg: &IoConfig) -> Result<Vec<T>, HyperslabError> {
    expect_len(data.len(), sel.extent().num_elements())?;
    let n = sel.num_elements();
    let mut out = Vec::new();
    out.try_reserve_exact(n as usize)
        .map_err(|_| HyperslabError::AllocationFailure { requested: n })?;
    drain_all_runs(sel, cfg, |runs| {
        for run in runs {
            out.extend_from_slice(&data[span(run)]);
        }
    })?;
    Ok(out)
}

/// Copy `packed` into the selected elements of `data`, in row-major order.
///
/// # Errors
/// - `BufferLengthMismatch` if `data` does not hold the whole extent or
///   `packed` does not hold exactly one value per selected element.
/// - Any error of [`Selection::iter`] or [`IoConfig::validate`].
pub fn scatter<T: Clone>(
    sel: &Selection,
    packed: &[T],
    data: &mut [T],
    cfg: &IoConfig,
) -> Result<(), HyperslabError> {
    expect_len(data.len(), sel.extent().num_elements())?;
    expect_len(packed.len(), sel.num_elements())?;
    let mut start = 0usize;
    drain_all_runs(sel, cfg, |runs| {
        for run in runs {
            let end = start + run.len as usize;
            data[span(run)].clone_from_slice(&packed[start..end]);
            start = end;
        }
    })?;
    Ok(())
}

/// Visit every selected element in row-major order with its coordinates
/// (offset applied) and linear index. Stops as soon as `f` breaks.
///
/// Returns `true` if every element was visited.
///
/// # Errors
/// Any error of [`Selection::iter`] or [`IoConfig::validate`].
pub fn for_each_element<F>(sel: &Selection, cfg: &IoConfig, mut f: F) -> Result<bool, HyperslabError>
where
    F: FnMut(&[u64], u64) -> ControlFlow<()>,
{
    let extent = sel.extent();
    let flow = drain_runs(sel, cfg, |runs| {
        for run in runs {
            for idx in run.offset..run.offset + run.len {
                f(&extent.coords_of(idx), idx)?;
            }
        }
        ControlFlow::Continue(())
    })?;
    Ok(flow.is_continue())
}
