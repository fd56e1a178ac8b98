// tests/math_tests.rs
use keel::{closest_cluster, k_means, KeelError};

fn assert_centers(actual: &[f64], expected: &[f64]) {
  assert_eq!(actual.len(), expected.len(), "centers {:?} vs {:?}", actual, expected);
  for (a, e) in actual.iter().zip(expected) {
    assert!((a - e).abs() < 1e-9, "centers {:?} vs {:?}", actual, expected);
  }
}

#[test]
fn test_k_means_rejects_zero_clusters() {
  assert!(matches!(k_means(&[1.0, 2.0], 0), Err(KeelError::InvalidArgument(_))));
}

#[test]
fn test_k_means_rejects_non_finite_points() {
  assert!(matches!(k_means(&[1.0, f64::NAN], 1), Err(KeelError::InvalidArgument(_))));
  assert!(matches!(k_means(&[f64::INFINITY], 1), Err(KeelError::InvalidArgument(_))));
}

#[test]
fn test_k_means_with_fewer_points_than_clusters() {
  assert_centers(&k_means(&[3.0, 1.0, 3.0], 5).unwrap(), &[1.0, 3.0]);
  assert!(k_means(&[], 2).unwrap().is_empty());
}

#[test]
fn test_k_means_single_cluster_is_the_mean() {
  assert_centers(&k_means(&[4.0, 1.0, 7.0], 1).unwrap(), &[4.0]);
}

#[test]
fn test_k_means_separates_two_groups() {
  let points = [11.0, 1.0, 12.0, 2.0, 10.0, 3.0];
  assert_centers(&k_means(&points, 2).unwrap(), &[2.0, 11.0]);
}

#[test]
fn test_k_means_three_groups_of_uneven_size() {
  let points = [0.0, 0.5, 1.0, 50.0, 100.0, 101.0];
  assert_centers(&k_means(&points, 3).unwrap(), &[0.5, 50.0, 100.5]);
}

#[test]
fn test_k_means_one_center_per_point() {
  assert_centers(&k_means(&[5.0, -1.0, 2.0], 3).unwrap(), &[-1.0, 2.0, 5.0]);
}

#[test]
fn test_k_means_duplicate_points_collapse_centers() {
  // Only two distinct values: a third cluster cannot add a distinct center.
  assert_centers(&k_means(&[1.0, 1.0, 1.0, 9.0], 3).unwrap(), &[1.0, 9.0]);
}

#[test]
fn test_closest_cluster() {
  let centers = [2.0, 11.0, 40.0];
  assert_eq!(closest_cluster(4.0, &centers), Some(2.0));
  assert_eq!(closest_cluster(9.0, &centers), Some(11.0));
  assert_eq!(closest_cluster(-100.0, &centers), Some(2.0));
  assert_eq!(closest_cluster(1000.0, &centers), Some(40.0));
  assert_eq!(closest_cluster(3.0, &[]), None);
}

#[test]
fn test_k_means_handles_magnitudes_whose_squares_overflow() {
  let centers = k_means(&[1e200, 2e200], 1).unwrap();
  assert_eq!(centers.len(), 1);
  assert!((centers[0] / 1.5e200 - 1.0).abs() < 1e-12, "centers {:?}", centers);

  let centers = k_means(&[9.1e250, 1e250, 9e250, 1.1e250], 2).unwrap();
  assert_eq!(centers.len(), 2);
  assert!((centers[0] / 1.05e250 - 1.0).abs() < 1e-12, "centers {:?}", centers);
  assert!((centers[1] / 9.05e250 - 1.0).abs() < 1e-12, "centers {:?}", centers);

  let centers = k_means(&[-f64::MAX, f64::MAX], 2).unwrap();
  assert_eq!(centers, vec![-f64::MAX, f64::MAX]);
}
