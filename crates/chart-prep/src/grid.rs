// File: crates/chart-prep/src/grid.rs
// Summary: Tick index layout helpers.

/// Evenly strided tick indices over `n` samples aiming for `target` ticks.
/// `stride = max(1, ceil(n / target))`; index 0 and `n - 1` are always present, so the
/// result is strictly increasing with at most `target + 1` entries.
pub fn tick_indices(n: usize, target: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let stride = n.div_ceil(target.max(1)).max(1);
    let mut ticks: Vec<usize> = (0..n).step_by(stride).collect();
    if ticks.last() != Some(&(n - 1)) {
        ticks.push(n - 1);
    }
    ticks
}
