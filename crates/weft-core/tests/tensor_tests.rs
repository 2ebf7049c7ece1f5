// Cross-backend tensor behavior — the same logical operations must agree
// between the row-major native backend and the column-major BLAS backend.

use weft_core::linalg::{add, dot, vdot};
use weft_core::numeric::{concat, is_close};
use weft_core::{
    BlasStorage, DimensionOrder, Extent, IndexSpec, NativeStorage, Storage, Tensor,
};

type NT = Tensor<NativeStorage<f64>>;
type BT = Tensor<BlasStorage<f64>>;

// Rearrange row-major data into column-major layout, so a BLAS tensor holds
// the same logical values as a native one built from `data`.
fn as_column_major(data: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len());
    for c in 0..cols {
        for r in 0..rows {
            out.push(data[r * cols + c]);
        }
    }
    out
}

fn iota(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64).collect()
}

// Applies the composite-window fixture: top row := 1, column 1 := 2,
// bottom-right block := 3, then checks the row-major flattened contents.
fn window_write_through<S: Storage<Elem = f64>>(t: &Tensor<S>) {
    t.set_window(&[IndexSpec::At(0), IndexSpec::All], &Tensor::filled(1usize, 1.0))
        .unwrap();
    t.set_window(&[IndexSpec::All, IndexSpec::At(1)], &Tensor::filled(1usize, 2.0))
        .unwrap();
    t.set_window(
        &[IndexSpec::Range(1, 3), IndexSpec::Range(2, 5)],
        &Tensor::filled(1usize, 3.0),
    )
    .unwrap();

    let flat: Vec<f64> = t
        .indices_in(DimensionOrder::RowMajor)
        .map(|idx| t.get(&idx))
        .collect();
    let expected = vec![
        1.0, 2.0, 1.0, 1.0, 1.0, //
        0.0, 2.0, 3.0, 3.0, 3.0, //
        0.0, 2.0, 3.0, 3.0, 3.0,
    ];
    assert_eq!(flat, expected);
}

#[test]
fn test_window_write_through_native() {
    window_write_through(&NT::zeros((3, 5)));
}

#[test]
fn test_window_write_through_blas() {
    window_write_through(&BT::zeros((3, 5)));
}

#[test]
fn test_block_window_offsets() {
    let t = NT::from_array(&iota(100), (10, 10)).unwrap();
    let w = t
        .window(&[IndexSpec::Range(5, 10), IndexSpec::Range(5, 10)])
        .unwrap();

    let offsets: Vec<usize> = w.indices().map(|idx| w.offset_of(&idx)).collect();
    let expected: Vec<usize> = (5..10)
        .flat_map(|r| (5..10).map(move |c| r * 10 + c))
        .collect();
    assert_eq!(offsets, expected);

    assert_eq!(w.get(&[0, 0]), 55.0);
    assert_eq!(w.get(&[4, 4]), 99.0);
}

#[test]
fn test_backends_hold_identical_logical_values() {
    let data = iota(10);
    let native = NT::from_array(&data, (2, 5)).unwrap();
    let blas = BT::from_array(&as_column_major(&data, 2, 5), (2, 5)).unwrap();

    // identical sequences under an explicitly shared traversal order
    let n: Vec<f64> = native
        .indices_in(DimensionOrder::RowMajor)
        .map(|i| native.get(&i))
        .collect();
    let b: Vec<f64> = blas
        .indices_in(DimensionOrder::RowMajor)
        .map(|i| blas.get(&i))
        .collect();
    assert_eq!(n, b);

    // each backend's default order walks its own storage sequentially
    for (i, idx) in native.indices().enumerate() {
        assert_eq!(native.offset_of(&idx), i);
    }
    for (i, idx) in blas.indices().enumerate() {
        assert_eq!(blas.offset_of(&idx), i);
    }
}

#[test]
fn test_transpose_roundtrip_preserves_sequence() {
    let t = NT::from_array(&iota(10), (2, 5)).unwrap();
    let back = t.transpose().transpose();
    assert_eq!(back.shape(), t.shape());
    let orig: Vec<f64> = t.indices().map(|i| t.get(&i)).collect();
    let round: Vec<f64> = back.indices().map(|i| back.get(&i)).collect();
    assert_eq!(orig, round);
}

#[test]
fn test_transpose_blas_matches_native() {
    let data = iota(6);
    let native = NT::from_array(&data, (2, 3)).unwrap().transpose();
    let blas = BT::from_array(&as_column_major(&data, 2, 3), (2, 3))
        .unwrap()
        .transpose();
    for r in 0..3 {
        for c in 0..2 {
            assert_eq!(native.get(&[r, c]), blas.get(&[r, c]));
        }
    }
}

#[test]
fn test_reshape_preserves_natural_sequence() {
    let t = NT::from_array(&iota(6), (2, 3)).unwrap();
    let r = t.reshape((3, 2)).unwrap();
    let orig: Vec<f64> = t.indices().map(|i| t.get(&i)).collect();
    let reshaped: Vec<f64> = r.indices().map(|i| r.get(&i)).collect();
    assert_eq!(orig, reshaped);
}

#[test]
fn test_window_of_transpose() {
    let t = NT::from_array(&iota(20), (4, 5)).unwrap();
    let col = t.transpose().window(&[IndexSpec::At(2), IndexSpec::All]).unwrap();
    // row 2 of the transpose is column 2 of the original
    assert_eq!(col.shape(), &Extent::from(4usize));
    for r in 0..4 {
        assert_eq!(col.get(&[r]), t.get(&[r, 2]));
    }
}

#[test]
fn test_vdot_fixture() {
    let w = NT::row_vector(&[2.0, 2.0, 2.0, 2.0]);
    let v = add(
        &NT::vector(&[1.0, 2.0, 3.0, 4.0]),
        &NT::vector(&[1.0, 2.0, 3.0, 4.0]),
    )
    .unwrap();
    assert_eq!(vdot(&w, &v).unwrap(), 40.0);
}

#[test]
fn test_dot_identity_fixture() {
    let eye = NT::eye(3);
    let x = NT::column_vector(&[1.0, 2.0, 3.0]);
    let y = dot(&eye, &x).unwrap();
    assert!(is_close(&y, &NT::column_vector(&[1.0, 2.0, 3.0]), 1e-12));
}

#[test]
fn test_concat_matrices_both_axes() {
    let a = NT::from_rows(&[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]).unwrap();
    let b = NT::from_rows(&[
        vec![9.0, 10.0, 11.0, 12.0],
        vec![13.0, 14.0, 15.0, 16.0],
    ])
    .unwrap();

    let rows = concat(&a, &b, 0).unwrap();
    assert_eq!(rows.shape(), &Extent::from((4, 4)));
    assert_eq!(rows.get(&[0, 0]), 1.0);
    assert_eq!(rows.get(&[2, 0]), 9.0);
    assert_eq!(rows.get(&[3, 3]), 16.0);

    let cols = concat(&a, &b, 1).unwrap();
    assert_eq!(cols.shape(), &Extent::from((2, 8)));
}

#[test]
fn test_broadcast_write_into_window() {
    let t = NT::zeros((4, 4));
    t.set_window(
        &[IndexSpec::Range(1, 3), IndexSpec::All],
        &NT::row_vector(&[1.0, 2.0, 3.0, 4.0]),
    )
    .unwrap();
    for c in 0..4 {
        assert_eq!(t.get(&[0, c]), 0.0);
        assert_eq!(t.get(&[1, c]), (c + 1) as f64);
        assert_eq!(t.get(&[2, c]), (c + 1) as f64);
        assert_eq!(t.get(&[3, c]), 0.0);
    }
}

#[test]
fn test_rand_is_in_unit_interval() {
    let t = NT::rand((4, 4));
    for idx in t.indices() {
        let v = t.get(&idx);
        assert!((0.0..1.0).contains(&v));
    }
}
