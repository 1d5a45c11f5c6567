use ndarray::{arr2, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::cpu::ops::matmul::{
    binary_matmul, matmul, matmul_transpose_scale, ternary_matmul, transpose_matmul,
};
use crate::tensor::{BitMatrix, TernaryMatrix};

fn get_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
}

fn random_codes(rng: &mut StdRng, rows: usize, cols: usize) -> TernaryMatrix {
    let codes = Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1i8..=1));
    TernaryMatrix::from_signed(&codes.view()).unwrap()
}

fn max_diff(a: &Array2<f32>, b: &Array2<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0f32, f32::max)
}

/// Sequential reference: C = A @ B with B in direct [k, n] layout.
fn reference_matmul(a: &Array2<f32>, b: &Array2<f32>) -> Array2<f32> {
    let (m, k) = a.dim();
    let (_, n) = b.dim();
    let mut c = Array2::<f32>::zeros((m, n));
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for kk in 0..k {
                sum += a[(i, kk)] * b[(kk, j)];
            }
            c[(i, j)] = sum;
        }
    }
    c
}

#[test]
fn test_matmul_identity() {
    let a = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]);
    let identity = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
    let c = matmul(&a.view(), &identity.view());
    assert_eq!(c, a);
}

#[test]
fn test_matmul_matches_reference() {
    let mut rng = get_rng();
    let (m, k, n) = (7, 33, 12);
    let a = random_matrix(&mut rng, m, k);
    let b = random_matrix(&mut rng, k, n);

    let expected = reference_matmul(&a, &b);
    let actual = matmul(&a.view(), &b.view());

    let diff = max_diff(&expected, &actual);
    assert!(diff < 1e-5, "max diff {diff} exceeds tolerance");
}

#[test]
fn test_transpose_matmul_equals_direct_on_transposed_operand() {
    let mut rng = get_rng();
    let (m, k, n) = (5, 24, 9);
    let a = random_matrix(&mut rng, m, k);
    let bt = random_matrix(&mut rng, n, k); // [out, in]

    let expected = matmul(&a.view(), &bt.t());
    let actual = transpose_matmul(&a.view(), &bt.view());

    let diff = max_diff(&expected, &actual);
    assert!(diff < 1e-5, "max diff {diff} exceeds tolerance");
}

#[test]
fn test_decode_and_prefill_paths_agree() {
    let mut rng = get_rng();
    let (k, n) = (64, 50); // n chosen so thread chunks have a remainder
    let bt = random_matrix(&mut rng, n, k);
    let rows: Vec<Array2<f32>> = (0..3).map(|_| random_matrix(&mut rng, 1, k)).collect();

    // Prefill: all rows at once.
    let mut stacked = Array2::<f32>::zeros((3, k));
    for (i, r) in rows.iter().enumerate() {
        stacked.row_mut(i).assign(&r.row(0));
    }
    let batched = transpose_matmul(&stacked.view(), &bt.view());

    // Decode: one row at a time.
    for (i, r) in rows.iter().enumerate() {
        let single = transpose_matmul(&r.view(), &bt.view());
        let diff: f32 = single
            .row(0)
            .iter()
            .zip(batched.row(i).iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f32::max);
        assert!(diff < 1e-6, "row {i}: decode/prefill diverge by {diff}");
    }
}

#[test]
fn test_matmul_transpose_scale_divides() {
    let a = arr2(&[[2.0f32, 4.0]]);
    let bt = arr2(&[[1.0f32, 1.0], [1.0, -1.0]]);

    let unscaled = transpose_matmul(&a.view(), &bt.view());
    let scaled = matmul_transpose_scale(&a.view(), &bt.view(), 2.0);

    assert_eq!(unscaled, arr2(&[[6.0, -2.0]]));
    assert_eq!(scaled, arr2(&[[3.0, -1.0]]));
}

#[test]
fn test_ternary_all_zero_codes_give_zero_output() {
    let mut rng = get_rng();
    let a = random_matrix(&mut rng, 4, 16);
    let codes = Array2::<i8>::zeros((6, 16));
    let codes = TernaryMatrix::from_signed(&codes.view()).unwrap();

    let c = ternary_matmul(&a.view(), &codes);
    assert!(c.iter().all(|&v| v == 0.0));
}

#[test]
fn test_ternary_all_pos_codes_give_row_sums() {
    let mut rng = get_rng();
    let a = random_matrix(&mut rng, 3, 8);
    let codes = Array2::<i8>::ones((5, 8));
    let codes = TernaryMatrix::from_signed(&codes.view()).unwrap();

    let c = ternary_matmul(&a.view(), &codes);
    for i in 0..3 {
        let row_sum: f32 = a.row(i).iter().sum();
        for j in 0..5 {
            assert!(
                (c[(i, j)] - row_sum).abs() < 1e-5,
                "C[{i}][{j}] = {} != row sum {row_sum}",
                c[(i, j)]
            );
        }
    }
}

#[test]
fn test_ternary_worked_example() {
    // Codes [[1, -1], [0, 1]]: output 0 adds a[0] and subtracts a[1],
    // output 1 skips a[0] and adds a[1].
    let a = arr2(&[[2.0f32, 3.0], [4.0, 5.0]]);
    let codes = arr2(&[[1i8, -1], [0, 1]]);
    let codes = TernaryMatrix::from_signed(&codes.view()).unwrap();

    let c = ternary_matmul(&a.view(), &codes);
    assert_eq!(c[(0, 0)], -1.0); // 2 - 3
    assert_eq!(c[(0, 1)], 3.0); // 0 + 3
    assert_eq!(c[(1, 0)], -1.0); // 4 - 5
    assert_eq!(c[(1, 1)], 5.0); // 0 + 5
}

#[test]
fn test_ternary_equals_dense_matmul_on_code_values() {
    let mut rng = get_rng();
    let (m, k, n) = (4, 40, 11);
    let a = random_matrix(&mut rng, m, k);
    let codes = random_codes(&mut rng, n, k);

    let dense = Array2::from_shape_fn((n, k), |(i, j)| codes.get(i, j).value() as f32);
    let expected = transpose_matmul(&a.view(), &dense.view());
    let actual = ternary_matmul(&a.view(), &codes);

    let diff = max_diff(&expected, &actual);
    assert!(diff < 1e-5, "max diff {diff} exceeds tolerance");
}

#[test]
fn test_binary_equals_ternary_on_sign_codes() {
    let mut rng = get_rng();
    let (m, k, n) = (3, 70, 6); // k > 64 spans three packed words
    let a = random_matrix(&mut rng, m, k);
    let signs = Array2::from_shape_fn((n, k), |_| if rng.gen_bool(0.5) { 1i8 } else { -1 });

    let ternary = TernaryMatrix::from_signed(&signs.view()).unwrap();
    let bits = BitMatrix::from_signs(&signs.view()).unwrap();

    let expected = ternary_matmul(&a.view(), &ternary);
    let actual = binary_matmul(&a.view(), &bits);

    let diff = max_diff(&expected, &actual);
    assert!(diff < 1e-6, "max diff {diff} exceeds tolerance");
}

#[test]
fn test_binary_decode_path_matches_prefill() {
    let mut rng = get_rng();
    let (k, n) = (33, 17);
    let signs = Array2::from_shape_fn((n, k), |_| if rng.gen_bool(0.5) { 1i8 } else { -1 });
    let bits = BitMatrix::from_signs(&signs.view()).unwrap();

    let a1 = random_matrix(&mut rng, 1, k);
    let a2 = random_matrix(&mut rng, 1, k);
    let mut stacked = Array2::<f32>::zeros((2, k));
    stacked.row_mut(0).assign(&a1.row(0));
    stacked.row_mut(1).assign(&a2.row(0));

    let batched = binary_matmul(&stacked.view(), &bits);
    let single0 = binary_matmul(&a1.view(), &bits);
    let single1 = binary_matmul(&a2.view(), &bits);

    for j in 0..n {
        assert!((batched[(0, j)] - single0[(0, j)]).abs() < 1e-6);
        assert!((batched[(1, j)] - single1[(0, j)]).abs() < 1e-6);
    }
}

#[test]
#[should_panic(expected = "matmul dimension mismatch")]
fn test_dimension_mismatch_fails_fast() {
    let a = arr2(&[[1.0f32, 2.0, 3.0]]);
    let bt = arr2(&[[1.0f32, 2.0]]);
    let _ = transpose_matmul(&a.view(), &bt.view());
}
