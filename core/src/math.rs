// keel/src/math.rs

//! One-dimensional clustering helpers. Unrelated to scheduling.

use crate::error::{KeelError, KeelResult};

/// Optimal 1-D k-means.
///
/// Dynamic programming over the sorted points: `cost[i][c]` is the least
/// within-cluster sum of squares for the first `i` points split into exactly
/// `c` contiguous clusters. Returns the cluster centers ascending, with
/// duplicates removed. With fewer points than `k`, the distinct points are
/// their own centers.
pub fn k_means(points: &[f64], k: u32) -> KeelResult<Vec<f64>> {
  if k == 0 {
    return Err(KeelError::InvalidArgument("k_means: k must be positive".to_string()));
  }
  if points.iter().any(|p| !p.is_finite()) {
    return Err(KeelError::InvalidArgument("k_means: points must be finite".to_string()));
  }

  let mut sorted = points.to_vec();
  sorted.sort_by(f64::total_cmp);

  let k = k as usize;
  let n = sorted.len();
  if n < k {
    sorted.dedup();
    return Ok(sorted);
  }

  // Points whose squares would overflow are scaled down by a power of two,
  // which is exact.
  let scale = overflow_scale(&sorted);
  if scale != 1.0 {
    sorted.iter_mut().for_each(|p| *p /= scale);
  }

  let mut cost = vec![vec![f64::INFINITY; k + 1]; n + 1];
  let mut mean = vec![vec![0.0; k + 1]; n + 1];
  let mut start = vec![vec![0usize; k + 1]; n + 1];
  cost[0][0] = 0.0;

  for end in 1..=n {
    for clusters in 1..=k.min(end) {
      let (mut sum, mut sum_squares) = (0.0, 0.0);
      // Last cluster is sorted[first..end].
      for first in (0..end).rev() {
        sum += sorted[first];
        sum_squares += sorted[first] * sorted[first];
        let prefix = cost[first][clusters - 1];
        if !prefix.is_finite() {
          continue;
        }
        let size = (end - first) as f64;
        let candidate = prefix + sum_squares - sum * sum / size;
        if candidate < cost[end][clusters] {
          cost[end][clusters] = candidate;
          mean[end][clusters] = sum / size;
          start[end][clusters] = first;
        }
      }
    }
  }

  let mut centers = Vec::with_capacity(k);
  let mut end = n;
  for clusters in (1..=k).rev() {
    centers.push(mean[end][clusters] * scale);
    end = start[end][clusters];
  }
  centers.sort_by(f64::total_cmp);
  centers.dedup();
  Ok(centers)
}

/// Points up to this magnitude keep squared cluster sums finite.
const SQUARE_SAFE_MAGNITUDE: f64 = 1e100;

fn overflow_scale(points: &[f64]) -> f64 {
  let magnitude = points.iter().fold(0.0f64, |max, p| max.max(p.abs()));
  if magnitude <= SQUARE_SAFE_MAGNITUDE {
    return 1.0;
  }
  let exponent = (magnitude.log2().ceil() as u64).min(1023);
  f64::from_bits((exponent + 1023) << 52)
}

/// Nearest center to `p`. `centers` must be ascending, as returned by
/// `k_means`.
pub fn closest_cluster(p: f64, centers: &[f64]) -> Option<f64> {
  let mut best: Option<(f64, f64)> = None;
  for &center in centers {
    let distance = (center - p).abs();
    match best {
      Some((_, best_distance)) if distance >= best_distance => break,
      _ => best = Some((center, distance)),
    }
  }
  best.map(|(center, _)| center)
}
