//! Waypoint index distribution.

/// Spread `n` waypoints evenly over the node range between `from` and `to` inclusive.
///
/// The waypoints split the span between the boundary nodes just outside the range into `n + 1`
/// integer gaps, with any remainder given one node at a time to the gaps nearest `from`. The
/// returned indices run from the `from` end towards the `to` end, so reversing the range mirrors
/// the result.
///
/// If there are more waypoints than nodes in the range only as many as fit are placed.
pub fn distribute_waypoints(n: usize, from: usize, to: usize) -> Vec<usize> {
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };

    let n = n.min(hi - lo + 1);
    if n == 0 {
        return Vec::new();
    }

    // Distance between the boundary nodes lo - 1 and hi + 1, which is never less than n + 1
    let span = hi - lo + 2;
    let num_gaps = n + 1;
    let base = span / num_gaps;
    let remainder = span % num_gaps;

    let mut offset = 0;
    (0..n)
        .map(|i| {
            offset += base + if i < remainder { 1 } else { 0 };

            if from <= to {
                lo + offset - 1
            } else {
                hi + 1 - offset
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_three_over_range() {
        let fwd = distribute_waypoints(3, 1, 18);
        assert_eq!(fwd, vec![5, 10, 15]);

        let rev = distribute_waypoints(3, 18, 1);
        assert_eq!(rev, vec![14, 9, 4]);

        for (f, r) in fwd.iter().zip(rev.iter()) {
            assert_eq!(f - 1, 18 - r);
        }
    }

    #[test]
    fn test_monotonic_within_range() {
        for n in 0..25 {
            let idx = distribute_waypoints(n, 1, 18);
            assert_eq!(idx.len(), n.min(18));
            assert!(idx.windows(2).all(|w| w[0] < w[1]));
            assert!(idx.iter().all(|&i| (1..=18).contains(&i)));
        }
    }

    #[test]
    fn test_edge_cases() {
        assert!(distribute_waypoints(0, 1, 18).is_empty());
        assert_eq!(distribute_waypoints(1, 4, 4), vec![4]);
        assert_eq!(distribute_waypoints(3, 0, 1), vec![0, 1]);
        assert_eq!(distribute_waypoints(1, 0, 0), vec![0]);
    }
}
