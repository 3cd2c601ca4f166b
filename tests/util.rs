#![allow(dead_code)]
//! Brute-force reference model shared by the integration tests.

use hyperslab::{Extent, RegularDim, SelectOp, Selection};
use rand::Rng;

/// Dense membership mask over every element of an extent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dense {
    pub extent: Extent,
    pub cells: Vec<bool>,
}

impl Dense {
    pub fn empty(extent: &Extent) -> Self {
        Self {
            extent: extent.clone(),
            cells: vec![false; extent.num_elements() as usize],
        }
    }

    pub fn hyperslab(extent: &Extent, dims: &[RegularDim]) -> Self {
        let mut out = Self::empty(extent);
        for (idx, cell) in out.cells.iter_mut().enumerate() {
            let coords = extent.coords_of(idx as u64);
            *cell = dims.iter().zip(&coords).all(|(d, &x)| d.contains(x));
        }
        out
    }

    /// Membership as reported by `sel.contains`.
    pub fn of(sel: &Selection) -> Self {
        let extent = sel.extent().clone();
        let mut out = Self::empty(&extent);
        for (idx, cell) in out.cells.iter_mut().enumerate() {
            *cell = sel.contains(&extent.coords_of(idx as u64));
        }
        out
    }

    pub fn apply(&mut self, op: SelectOp, other: &Dense) {
        for (a, &b) in self.cells.iter_mut().zip(&other.cells) {
            *a = match op {
                SelectOp::Set => b,
                SelectOp::Or => *a || b,
                SelectOp::And => *a && b,
                SelectOp::Xor => *a != b,
                SelectOp::NotB => *a && !b,
                SelectOp::NotA => !*a && b,
            };
        }
    }

    pub fn count(&self) -> u64 {
        self.cells.iter().filter(|&&c| c).count() as u64
    }

    /// Sorted linear indices of the selected elements after translating by
    /// `offset`.
    pub fn linear_with_offset(&self, offset: &[i64]) -> Vec<u64> {
        let mut out: Vec<u64> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(idx, _)| {
                let coords: Vec<u64> = self
                    .extent
                    .coords_of(idx as u64)
                    .iter()
                    .zip(offset)
                    .map(|(&x, &o)| (x as i64 + o) as u64)
                    .collect();
                self.extent.linear_index(&coords)
            })
            .collect();
        out.sort_unstable();
        out
    }
}

/// Shrink `(start, stride, count, block)` until the hyperslab fits in a
/// dimension of size `n`.
pub fn fit(n: u64, start: u64, stride_extra: u64, count: u64, block: u64) -> RegularDim {
    let block = block.clamp(1, n);
    let stride = block + stride_extra;
    let mut count = count.max(1);
    while count > 1 && (count - 1) * stride + block > n {
        count -= 1;
    }
    let span = (count - 1) * stride + block;
    RegularDim::new(start % (n - span + 1), stride, count, block)
}

pub fn random_extent<R: Rng>(rng: &mut R) -> Extent {
    let rank = rng.gen_range(1..=3);
    let dims: Vec<u64> = (0..rank).map(|_| rng.gen_range(1..=8)).collect();
    Extent::new(&dims).unwrap()
}

pub fn random_dims<R: Rng>(rng: &mut R, extent: &Extent) -> Vec<RegularDim> {
    extent
        .dims()
        .iter()
        .map(|&n| {
            fit(
                n,
                rng.gen_range(0..n),
                rng.gen_range(0..3),
                rng.gen_range(1..=3),
                rng.gen_range(1..=3),
            )
        })
        .collect()
}

pub fn random_op<R: Rng>(rng: &mut R) -> SelectOp {
    [
        SelectOp::Set,
        SelectOp::Or,
        SelectOp::And,
        SelectOp::Xor,
        SelectOp::NotB,
        SelectOp::NotA,
    ][rng.gen_range(0..6)]
}

pub fn apply_dims(sel: &mut Selection, op: SelectOp, dims: &[RegularDim]) {
    let start: Vec<u64> = dims.iter().map(|d| d.start).collect();
    let stride: Vec<u64> = dims.iter().map(|d| d.stride).collect();
    let count: Vec<u64> = dims.iter().map(|d| d.count).collect();
    let block: Vec<u64> = dims.iter().map(|d| d.block).collect();
    sel.select_hyperslab(op, &start, Some(&stride), &count, Some(&block))
        .unwrap();
}

/// A random selection built from a few operators, with its dense model.
pub fn random_selection<R: Rng>(rng: &mut R, extent: &Extent) -> (Selection, Dense) {
    let mut sel = Selection::none(extent.clone());
    let mut dense = Dense::empty(extent);
    for i in 0..rng.gen_range(1..=4) {
        let op = if i == 0 { SelectOp::Set } else { random_op(rng) };
        let dims = random_dims(rng, extent);
        apply_dims(&mut sel, op, &dims);
        dense.apply(op, &Dense::hyperslab(extent, &dims));
    }
    (sel, dense)
}
