use ndarray::Array2;

/// In-place L2 normalization helper to keep allocations down during hot paths.
/// Zero vectors are left untouched.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    if norm_sq > 0.0 {
        let inv_norm = norm_sq.sqrt().recip();
        for x in v.iter_mut() {
            *x *= inv_norm;
        }
    }
}

/// Normalize every row of an (N, D) matrix to unit length. All-zero rows
/// have no direction and are left as zeros.
pub fn l2_normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.rows_mut() {
        let norm_sq: f32 = row.iter().map(|x| x * x).sum();
        if norm_sq > 0.0 {
            row *= norm_sq.sqrt().recip();
        }
    }
}

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
