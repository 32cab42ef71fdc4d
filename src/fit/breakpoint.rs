//! Profiling the breakpoint of a split model.
//!
//! A split model's residuals are a step function of `x0`: they only change
//! when `x0` crosses an abscissa. Instead of differentiating, the breakpoint
//! is profiled: every partition of the data reachable inside the breakpoint
//! bounds is fitted on its own and the best one wins.

use crate::parameters::bounds::Bounds;

/// One way of splitting the data between the two branches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position in the scan; ties are broken towards the lowest index.
    pub index: usize,

    /// Representative breakpoint for this partition.
    pub x0: f64,

    /// Breakpoints inside the bounds that keep this partition. The upper end
    /// stops one ulp short of the next abscissa, which `x0` would pull left.
    pub interval: Bounds,

    /// Number of distinct abscissae on the left branch.
    pub left_count: usize,
}

/// Partitions of the sorted distinct abscissae `xs` reachable inside `bounds`.
///
/// Partitions that put every point on one branch are returned only when no
/// partition with data on both branches is reachable.
pub fn candidates(xs: &[f64], bounds: Bounds) -> Vec<Candidate> {
    let (lo, hi) = (bounds.min, bounds.max);
    let mut result = Vec::new();

    // left branch holds xs[..k]
    for k in 1..xs.len() {
        let (below, above) = (xs[k - 1], xs[k]);
        if lo < above && hi >= below {
            result.push(Candidate {
                index: result.len(),
                x0: bounds.clamp(below + (above - below) / 2.0),
                interval: Bounds {
                    min: below.max(lo),
                    max: just_below(above).min(hi),
                },
                left_count: k,
            });
        }
    }

    if !result.is_empty() {
        return result;
    }

    let (Some(&first), Some(&last)) = (xs.first(), xs.last()) else {
        return result;
    };
    let gap = if xs.len() > 1 {
        (last - first) / (xs.len() - 1) as f64
    } else {
        1.0
    };

    if lo < first {
        result.push(Candidate {
            index: result.len(),
            x0: bounds.clamp(first - gap),
            interval: Bounds {
                min: lo,
                max: just_below(first).min(hi),
            },
            left_count: 0,
        });
    }
    if hi >= last {
        result.push(Candidate {
            index: result.len(),
            x0: bounds.clamp(last + gap),
            interval: Bounds {
                min: last.max(lo),
                max: hi,
            },
            left_count: xs.len(),
        });
    }

    result
}

/// The largest float strictly below a finite `value`.
fn just_below(value: f64) -> f64 {
    if value > 0.0 {
        f64::from_bits(value.to_bits() - 1)
    } else if value < 0.0 {
        f64::from_bits(value.to_bits() + 1)
    } else {
        -f64::from_bits(1)
    }
}
