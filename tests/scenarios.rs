use hyperslab::prelude::*;
use hyperslab::span::{make, rebuild};

fn ten_by_ten() -> Extent {
    Extent::new(&[10, 10]).unwrap()
}

#[test]
fn overlapping_squares_union() {
    let mut sel = Selection::none(ten_by_ten());
    sel.select_hyperslab(SelectOp::Set, &[0, 0], Some(&[1, 1]), &[1, 1], Some(&[4, 4]))
        .unwrap();
    sel.select_hyperslab(SelectOp::Or, &[2, 2], None, &[1, 1], Some(&[4, 4]))
        .unwrap();
    assert_eq!(sel.num_elements(), 28);
    assert!(!sel.is_single_block());
    assert!(!sel.is_contiguous());
    assert_eq!(sel.bounds().unwrap(), vec![(0, 5), (0, 5)]);
    assert!(sel.validate_invariants().is_ok());
}

#[test]
fn full_extent_is_one_run() {
    let mut sel = Selection::none(ten_by_ten());
    sel.select_hyperslab(SelectOp::Set, &[0, 0], None, &[1, 1], Some(&[10, 10]))
        .unwrap();
    assert!(sel.is_contiguous());
    assert!(sel.is_single_block());
    for elmt_size in [1, 4, 8] {
        let mut it = sel.iter(elmt_size).unwrap();
        let (runs, n) = it.next_runs(8, u64::MAX);
        assert_eq!(runs, vec![Run { offset: 0, len: 100 * elmt_size }]);
        assert_eq!(n, 100);
    }
    assert_eq!(Selection::all(ten_by_ten()).num_elements(), 100);
}

#[test]
fn and_of_disjoint_blocks_is_empty() {
    let mut sel = Selection::hyperslab(ten_by_ten(), &[0, 0], None, &[1, 1], Some(&[3, 3])).unwrap();
    sel.select_hyperslab(SelectOp::And, &[5, 5], None, &[1, 1], Some(&[3, 3]))
        .unwrap();
    assert_eq!(sel.num_elements(), 0);
    let mut it = sel.iter(4).unwrap();
    let (runs, consumed) = it.next_runs(16, u64::MAX);
    assert!(runs.is_empty());
    assert_eq!(consumed, 0);
    assert!(sel.bounds().is_err());
}

#[test]
fn strided_rows_and_columns() {
    // every other row, columns 1..=3 and 6..=8
    let sel = Selection::hyperslab(ten_by_ten(), &[0, 1], Some(&[2, 5]), &[5, 2], Some(&[1, 3])).unwrap();
    assert_eq!(sel.num_elements(), 30);
    assert_eq!(sel.num_blocks(), 10);
    let desc = sel.regular_hyperslab().unwrap();
    assert_eq!(desc.app()[0], RegularDim::new(0, 2, 5, 1));
    let mut it = sel.iter(1).unwrap();
    let (runs, n) = it.next_runs(4, u64::MAX);
    assert_eq!(n, 12);
    assert_eq!(
        runs,
        vec![
            Run { offset: 1, len: 3 },
            Run { offset: 6, len: 3 },
            Run { offset: 21, len: 3 },
            Run { offset: 26, len: 3 },
        ]
    );
}

#[test]
fn set_is_idempotent() {
    let mut sel = Selection::none(ten_by_ten());
    for _ in 0..2 {
        sel.select_hyperslab(SelectOp::Set, &[1, 0], Some(&[3, 1]), &[3, 1], Some(&[2, 10]))
            .unwrap();
        assert_eq!(sel.num_elements(), 60);
        assert!(!sel.is_contiguous());
        assert!(!sel.is_single_block());
    }
}

#[test]
fn make_then_rebuild_round_trips() {
    let dims = [RegularDim::new(1, 3, 3, 2), RegularDim::new(0, 4, 2, 1)];
    let tree = make(&dims).unwrap();
    let back = rebuild(&tree, 2).unwrap();
    assert_eq!(back, dims);
    let again = make(&back).unwrap();
    assert_eq!(again.num_elements(), 12);
    assert_eq!(again.bounds(), tree.bounds());
}

#[test]
fn offset_moves_io_but_not_membership() {
    let mut sel = Selection::hyperslab(ten_by_ten(), &[0, 0], None, &[1, 1], Some(&[2, 2])).unwrap();
    sel.set_offset(&[8, 3]).unwrap();
    assert!(sel.contains(&[0, 0]));
    assert_eq!(sel.bounds().unwrap(), vec![(8, 9), (3, 4)]);
    let (runs, _) = sel.iter(1).unwrap().next_runs(4, u64::MAX);
    assert_eq!(runs, vec![Run { offset: 83, len: 2 }, Run { offset: 93, len: 2 }]);

    sel.set_offset(&[9, 0]).unwrap();
    assert!(matches!(sel.bounds(), Err(HyperslabError::OutOfBounds { dim: 0, .. })));
    assert!(sel.iter(1).is_err());
}

#[test]
fn validation_errors_leave_selection_untouched() {
    let mut sel = Selection::hyperslab(ten_by_ten(), &[1, 1], None, &[1, 1], Some(&[2, 2])).unwrap();
    let err = sel
        .select_hyperslab(SelectOp::Or, &[0, 0], Some(&[1, 1]), &[2, 2], Some(&[2, 2]))
        .unwrap_err();
    assert!(matches!(err, HyperslabError::OverlapError { dim: 0, .. }));
    let err = sel
        .select_hyperslab(SelectOp::Or, &[0, 0], Some(&[0, 1]), &[1, 1], None)
        .unwrap_err();
    assert!(matches!(err, HyperslabError::InvalidArgument(_)));
    let err = sel
        .select_hyperslab(SelectOp::Or, &[0], None, &[1], None)
        .unwrap_err();
    assert!(matches!(err, HyperslabError::InvalidArgument(_)));
    assert_eq!(sel.num_elements(), 4);
    assert!(sel.is_single_block());
}

#[test]
fn persisted_form_round_trips() {
    let mut sel = Selection::hyperslab(ten_by_ten(), &[0, 0], None, &[1, 1], Some(&[4, 4])).unwrap();
    sel.select_hyperslab(SelectOp::Xor, &[2, 2], None, &[1, 1], Some(&[4, 4]))
        .unwrap();
    let bytes = encode_selection(&sel).unwrap();
    assert_eq!(bytes.len() as u64, serial_size(&sel));
    let back = decode_selection(&ten_by_ten(), &bytes).unwrap();
    assert_eq!(back.num_elements(), sel.num_elements());
    assert_eq!(back.blocks(), sel.blocks());

    let wrong_rank = Extent::new(&[10, 10, 10]).unwrap();
    assert!(matches!(
        decode_selection(&wrong_rank, &bytes),
        Err(HyperslabError::CorruptEncoding(_))
    ));
}
