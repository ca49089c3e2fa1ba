//! Numeric filtering primitives
//!
//! The small set of collaborators bottom detection needs: separable
//! Gaussian smoothing, a vertical Sobel gradient, connected-component
//! labeling, a Butterworth low-pass with zero-phase application and
//! linear interpolation. All hand-rolled; edges are handled by
//! replication.
use ndarray::Array2;
use std::f64::consts::PI;

/// A normalized 1-D Gaussian kernel with radius `ceil(3 sigma)`
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i64;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Convolve along one axis with replicated edges
fn convolve_axis(image: &Array2<f64>, kernel: &[f64], axis: usize) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array2::zeros((rows, cols));
    for i in 0..rows {
        for j in 0..cols {
            let mut acc = 0.0;
            for (t, &kv) in kernel.iter().enumerate() {
                let d = t as isize - radius;
                let (ii, jj) = if axis == 0 {
                    ((i as isize + d).clamp(0, rows as isize - 1) as usize, j)
                } else {
                    (i, (j as isize + d).clamp(0, cols as isize - 1) as usize)
                };
                acc += kv * image[(ii, jj)];
            }
            out[(i, j)] = acc;
        }
    }
    out
}

/// Separable 2-D Gaussian smoothing
pub fn gaussian_smooth(image: &Array2<f64>, sigma: f64) -> Array2<f64> {
    let kernel = gaussian_kernel(sigma);
    let tmp = convolve_axis(image, &kernel, 0);
    convolve_axis(&tmp, &kernel, 1)
}

/// Sobel gradient along the sample (row) axis
///
/// Positive where power increases with sample index, i.e. on the
/// rising edge of an echo.
pub fn vertical_gradient(image: &Array2<f64>) -> Array2<f64> {
    let deriv = convolve_axis(image, &[-1.0, 0.0, 1.0], 0);
    convolve_axis(&deriv, &[0.25, 0.5, 0.25], 1)
}

/// Population standard deviation over all elements
pub fn std_dev(image: &Array2<f64>) -> f64 {
    let n = image.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = image.sum() / n;
    let var = image.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Label connected components of a binary mask, 8-connectivity
///
/// Returns the label image (0 is background, classes are 1..=count)
/// and the number of classes.
pub fn label_components(mask: &Array2<bool>) -> (Array2<u32>, u32) {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut parent: Vec<u32> = vec![0];

    fn find(parent: &mut [u32], mut l: u32) -> u32 {
        while parent[l as usize] != l {
            parent[l as usize] = parent[parent[l as usize] as usize];
            l = parent[l as usize];
        }
        l
    }
    fn union(parent: &mut [u32], a: u32, b: u32) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent[ra.max(rb) as usize] = ra.min(rb);
        }
    }

    for i in 0..rows {
        for j in 0..cols {
            if !mask[(i, j)] {
                continue;
            }
            // previously visited 8-neighbors
            let mut neighbors = [0u32; 4];
            let mut n = 0;
            if i > 0 {
                if j > 0 && labels[(i - 1, j - 1)] != 0 {
                    neighbors[n] = labels[(i - 1, j - 1)];
                    n += 1;
                }
                if labels[(i - 1, j)] != 0 {
                    neighbors[n] = labels[(i - 1, j)];
                    n += 1;
                }
                if j + 1 < cols && labels[(i - 1, j + 1)] != 0 {
                    neighbors[n] = labels[(i - 1, j + 1)];
                    n += 1;
                }
            }
            if j > 0 && labels[(i, j - 1)] != 0 {
                neighbors[n] = labels[(i, j - 1)];
                n += 1;
            }
            if n == 0 {
                let l = parent.len() as u32;
                parent.push(l);
                labels[(i, j)] = l;
            } else {
                let mut min = neighbors[0];
                for &nb in &neighbors[1..n] {
                    min = min.min(nb);
                }
                labels[(i, j)] = min;
                for &nb in &neighbors[..n] {
                    union(&mut parent, min, nb);
                }
            }
        }
    }

    // compact the labels to 1..=count
    let mut remap = vec![0u32; parent.len()];
    let mut count = 0;
    for i in 0..rows {
        for j in 0..cols {
            let l = labels[(i, j)];
            if l == 0 {
                continue;
            }
            let root = find(&mut parent, l);
            if remap[root as usize] == 0 {
                count += 1;
                remap[root as usize] = count;
            }
            labels[(i, j)] = remap[root as usize];
        }
    }
    (labels, count)
}

/// Design a digital Butterworth low-pass by bilinear transform
///
/// Returns `(b, a)` with `a[0] == 1` and unit DC gain.
pub fn butter_lowpass(order: usize, cutoff: f64, sample_rate: f64) -> (Vec<f64>, Vec<f64>) {
    type C64 = (f64, f64);
    fn c_add(a: C64, b: C64) -> C64 {
        (a.0 + b.0, a.1 + b.1)
    }
    fn c_sub(a: C64, b: C64) -> C64 {
        (a.0 - b.0, a.1 - b.1)
    }
    fn c_mul(a: C64, b: C64) -> C64 {
        (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
    }
    fn c_div(a: C64, b: C64) -> C64 {
        let d = b.0 * b.0 + b.1 * b.1;
        ((a.0 * b.0 + a.1 * b.1) / d, (a.1 * b.0 - a.0 * b.1) / d)
    }
    /// Real coefficients of `prod (z - r_k)`, highest order first
    fn poly(roots: &[C64]) -> Vec<f64> {
        let mut c: Vec<C64> = vec![(1.0, 0.0)];
        for &r in roots {
            c.push((0.0, 0.0));
            for i in (1..c.len()).rev() {
                let t = c_mul(c[i - 1], r);
                c[i] = c_sub(c[i], t);
            }
        }
        c.into_iter().map(|v| v.0).collect()
    }

    let fs2 = 2.0 * sample_rate;
    let warped = fs2 * (PI * cutoff / sample_rate).tan();
    let mut zpoles = Vec::with_capacity(order);
    for k in 0..order {
        let theta = PI * (2.0 * k as f64 + order as f64 + 1.0) / (2.0 * order as f64);
        let s = (warped * theta.cos(), warped * theta.sin());
        zpoles.push(c_div(c_add((fs2, 0.0), s), c_sub((fs2, 0.0), s)));
    }
    let zzeros = vec![(-1.0, 0.0); order];
    let b = poly(&zzeros);
    let a = poly(&zpoles);
    let gain = a.iter().sum::<f64>() / b.iter().sum::<f64>();
    (b.into_iter().map(|v| v * gain).collect(), a)
}

/// Normalized `(b, a)` padded to a common length with `a[0] == 1`
fn normalize(b: &[f64], a: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = b.len().max(a.len());
    let mut bb = b.to_vec();
    bb.resize(n, 0.0);
    let mut aa = a.to_vec();
    aa.resize(n, 0.0);
    let a0 = aa[0];
    for v in &mut bb {
        *v /= a0;
    }
    for v in &mut aa {
        *v /= a0;
    }
    (bb, aa)
}

fn lfilter_state(b: &[f64], a: &[f64], x: &[f64], zi: &[f64]) -> Vec<f64> {
    let (bb, aa) = normalize(b, a);
    let n = bb.len();
    if n == 1 {
        return x.iter().map(|&xi| bb[0] * xi).collect();
    }
    let mut z = zi.to_vec();
    z.resize(n - 1, 0.0);
    let mut y = Vec::with_capacity(x.len());
    for &xi in x {
        let yi = bb[0] * xi + z[0];
        for i in 1..n - 1 {
            z[i - 1] = bb[i] * xi + z[i] - aa[i] * yi;
        }
        z[n - 2] = bb[n - 1] * xi - aa[n - 1] * yi;
        y.push(yi);
    }
    y
}

/// Direct-form II transposed IIR filter, zero initial state
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64]) -> Vec<f64> {
    lfilter_state(b, a, x, &[])
}

/// Solve a small dense linear system by Gaussian elimination with
/// partial pivoting
fn solve(mut m: Vec<Vec<f64>>, mut v: Vec<f64>) -> Vec<f64> {
    let n = v.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot);
        v.swap(col, pivot);
        let p = m[col][col];
        for row in col + 1..n {
            let f = m[row][col] / p;
            for k in col..n {
                m[row][k] -= f * m[col][k];
            }
            v[row] -= f * v[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = v[row];
        for k in row + 1..n {
            acc -= m[row][k] * x[k];
        }
        x[row] = acc / m[row][row];
    }
    x
}

/// Steady-state filter state for a unit step input
///
/// Scaled by the first sample and fed to the filter, this state puts
/// the filter at its settled response from sample zero instead of
/// ringing through a startup transient.
fn lfilter_zi(b: &[f64], a: &[f64]) -> Vec<f64> {
    let (bb, aa) = normalize(b, a);
    let n = bb.len();
    if n < 2 {
        return Vec::new();
    }
    let m = n - 1;
    // zi solves (I - A) zi = B with A the transposed companion matrix
    // of the denominator and B = b[1:] - a[1:] * b[0]
    let mut mat = vec![vec![0.0; m]; m];
    for (i, row) in mat.iter_mut().enumerate() {
        row[0] = aa[i + 1];
        if i == 0 {
            row[0] += 1.0;
        }
        for j in 1..m {
            let sub = if i == j - 1 { 1.0 } else { 0.0 };
            row[j] = if i == j { 1.0 } else { 0.0 } - sub;
        }
    }
    let rhs: Vec<f64> = (0..m).map(|i| bb[i + 1] - aa[i + 1] * bb[0]).collect();
    solve(mat, rhs)
}

/// Zero-phase filtering: forward pass, backward pass
///
/// The input is odd-extended at both ends and each pass starts from
/// the steady-state response to its first sample, so neither pass
/// rings at the edges. Inputs shorter than the padding are returned
/// unchanged.
pub fn filtfilt(b: &[f64], a: &[f64], x: &[f64]) -> Vec<f64> {
    let padlen = 3 * (b.len().max(a.len()).saturating_sub(1));
    if x.len() <= padlen || padlen == 0 {
        return x.to_vec();
    }
    let n = x.len();
    let mut ext = Vec::with_capacity(n + 2 * padlen);
    for i in (1..=padlen).rev() {
        ext.push(2.0 * x[0] - x[i]);
    }
    ext.extend_from_slice(x);
    for i in (n - 1 - padlen..=n - 2).rev() {
        ext.push(2.0 * x[n - 1] - x[i]);
    }
    let zi = lfilter_zi(b, a);
    let z0: Vec<f64> = zi.iter().map(|v| v * ext[0]).collect();
    let mut y = lfilter_state(b, a, &ext, &z0);
    y.reverse();
    let z0: Vec<f64> = zi.iter().map(|v| v * y[0]).collect();
    let mut y = lfilter_state(b, a, &y, &z0);
    y.reverse();
    y[padlen..padlen + n].to_vec()
}

/// Piecewise-linear interpolation of `(x, y)` samples onto `xi`
///
/// `x` must be ascending; queries outside the range clamp to the end
/// values.
pub fn interp1(x: &[f64], y: &[f64], xi: &[f64]) -> Vec<f64> {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    xi.iter()
        .map(|&q| {
            if n == 0 {
                return 0.0;
            }
            if q <= x[0] {
                return y[0];
            }
            if q >= x[n - 1] {
                return y[n - 1];
            }
            let k = x.partition_point(|&v| v < q);
            let (x0, x1) = (x[k - 1], x[k]);
            let (y0, y1) = (y[k - 1], y[k]);
            if x1 == x0 {
                y0
            } else {
                y0 + (y1 - y0) * (q - x0) / (x1 - x0)
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn gaussian_kernel_is_normalized() {
        let k = gaussian_kernel(2.5);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(k.len(), 2 * 8 + 1);
    }

    #[test]
    fn smoothing_preserves_a_constant_image() {
        let img = Array2::from_elem((20, 10), 3.0);
        let sm = gaussian_smooth(&img, 2.0);
        for v in sm.iter() {
            assert!((v - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn gradient_sign_follows_rising_edge() {
        let mut img = Array2::zeros((10, 4));
        for i in 5..10 {
            for j in 0..4 {
                img[(i, j)] = 10.0;
            }
        }
        let g = vertical_gradient(&img);
        assert!(g[(5, 2)] > 0.0);
        assert!(g[(2, 2)].abs() < 1e-12);
    }

    #[test]
    fn labels_separate_diagonal_from_distant_blobs() {
        let mask = array![
            [true, false, false, false],
            [false, true, false, false],
            [false, false, false, false],
            [false, false, false, true],
        ];
        let (labels, count) = label_components(&mask);
        assert_eq!(count, 2);
        // diagonal neighbors join under 8-connectivity
        assert_eq!(labels[(0, 0)], labels[(1, 1)]);
        assert_ne!(labels[(0, 0)], labels[(3, 3)]);
    }

    #[test]
    fn butterworth_has_unit_dc_gain() {
        let (b, a) = butter_lowpass(5, 0.05, 1.0);
        assert_eq!(b.len(), 6);
        assert_eq!(a.len(), 6);
        let dc = b.iter().sum::<f64>() / a.iter().sum::<f64>();
        assert!((dc - 1.0).abs() < 1e-9);
    }

    #[test]
    fn seeded_filter_starts_settled() {
        let (b, a) = butter_lowpass(5, 0.05, 1.0);
        let zi = lfilter_zi(&b, &a);
        let z0: Vec<f64> = zi.iter().map(|v| v * 3.0).collect();
        let y = lfilter_state(&b, &a, &vec![3.0; 50], &z0);
        for v in &y {
            assert!((v - 3.0).abs() < 1e-9, "settled output {v}");
        }
    }

    #[test]
    fn filtfilt_passes_a_constant_signal() {
        let (b, a) = butter_lowpass(5, 0.05, 1.0);
        let x = vec![2.0; 200];
        let y = filtfilt(&b, &a, &x);
        for v in &y {
            assert!((v - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn filtfilt_attenuates_fast_oscillation() {
        let (b, a) = butter_lowpass(5, 0.05, 1.0);
        let x: Vec<f64> = (0..400).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let y = filtfilt(&b, &a, &x);
        assert!(y[200].abs() < 1e-3);
    }

    #[test]
    fn interpolation_hits_midpoints_and_clamps() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 10.0, 0.0];
        let out = interp1(&x, &y, &[-1.0, 0.5, 1.5, 5.0]);
        assert_eq!(out, vec![0.0, 5.0, 5.0, 0.0]);
    }
}
