//! Fuzzy string similarity used for keyword detection.
//!
//! Scores follow a partial-ratio metric: the shorter string is aligned at
//! every offset of the longer one (including alignments that hang off either
//! end) and each alignment is scored by its longest common subsequence. The
//! best alignment wins, so `"taksi"` scores 100 against `"taksiga"`.

/// Case-insensitive partial similarity in `[0, 100]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a.len() == b.len() {
        return best_alignment(&a, &b).max(best_alignment(&b, &a));
    }
    if a.len() < b.len() {
        best_alignment(&a, &b)
    } else {
        best_alignment(&b, &a)
    }
}

/// Token-vs-keyword test. A token shorter than the keyword never matches.
pub fn matches(token: &str, keyword: &str, threshold: f64) -> bool {
    if token.chars().count() < keyword.chars().count() {
        return false;
    }
    similarity(token, keyword) >= threshold
}

/// Best score of `short` against every alignment with `long`.
/// Requires `short.len() <= long.len()`.
fn best_alignment(short: &[char], long: &[char]) -> f64 {
    let n = short.len();
    let m = long.len();
    if n == 0 {
        return if m == 0 { 100.0 } else { 0.0 };
    }

    let mut best = 0.0_f64;

    // Windows of full length first; an exact hit ends the search.
    for start in 0..=m - n {
        best = best.max(ratio(short, &long[start..start + n]));
        if best >= 100.0 {
            return 100.0;
        }
    }
    // Alignments hanging off the left and right edges.
    for end in 1..n {
        best = best.max(ratio(short, &long[..end]));
    }
    for start in m - n + 1..m {
        best = best.max(ratio(short, &long[start..]));
    }

    best
}

fn ratio(x: &[char], y: &[char]) -> f64 {
    let total = x.len() + y.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(x, y) as f64 / total as f64
}

fn lcs_len(x: &[char], y: &[char]) -> usize {
    let mut prev = vec![0usize; y.len() + 1];
    let mut curr = vec![0usize; y.len() + 1];
    for &cx in x {
        for (j, &cy) in y.iter().enumerate() {
            curr[j + 1] = if cx == cy {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[y.len()]
}
