//! Randomized properties of the regularized policy solver.

use lockstep_mcts::policy::{bisect, lambda_n, regularized_policy};
use ndarray::{Array1, Array2};
use proptest::prelude::*;

fn normalized(raw: &[f32]) -> Vec<f32> {
    let total: f32 = raw.iter().sum();
    raw.iter().map(|v| v / total).collect()
}

proptest! {
    #[test]
    fn solved_rows_are_distributions(
        raw_pi in prop::collection::vec(0.05f32..1.0, 2..=12),
        raw_q in prop::collection::vec(0.0f32..1.0, 12),
        lambda in 0.05f32..4.0,
    ) {
        let n = raw_pi.len();
        let pi = Array2::from_shape_vec((1, n), normalized(&raw_pi)).unwrap();
        let q = Array2::from_shape_vec((1, n), raw_q[..n].to_vec()).unwrap();
        let p = regularized_policy(&pi, &q, &Array1::from_vec(vec![lambda])).unwrap();

        let sum: f32 = p.row(0).sum();
        prop_assert!((sum - 1.0).abs() < 1e-4);
        // Positive prior mass keeps every action in the support.
        prop_assert!(p.iter().all(|&w| w > 0.0 && w <= 1.0 + 1e-6));
    }

    #[test]
    fn solver_is_bit_stable(
        raw_pi in prop::collection::vec(0.05f32..1.0, 2..=12),
        raw_q in prop::collection::vec(0.0f32..1.0, 12),
        lambda in 0.05f32..4.0,
    ) {
        let n = raw_pi.len();
        let pi = Array2::from_shape_vec((1, n), normalized(&raw_pi)).unwrap();
        let q = Array2::from_shape_vec((1, n), raw_q[..n].to_vec()).unwrap();
        let lambdas = Array1::from_vec(vec![lambda]);
        let first = regularized_policy(&pi, &q, &lambdas).unwrap();
        let second = regularized_policy(&pi, &q, &lambdas).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn equal_values_reproduce_the_prior(
        raw_pi in prop::collection::vec(0.05f32..1.0, 2..=8),
        q0 in 0.0f32..1.0,
        lambda in 0.05f32..4.0,
    ) {
        let n = raw_pi.len();
        let pi = normalized(&raw_pi);
        let p = regularized_policy(
            &Array2::from_shape_vec((1, n), pi.clone()).unwrap(),
            &Array2::from_elem((1, n), q0),
            &Array1::from_vec(vec![lambda]),
        )
        .unwrap();
        for a in 0..n {
            prop_assert!((p[[0, a]] - pi[a]).abs() < 1e-4);
        }
    }

    #[test]
    fn bisect_finds_linear_roots(
        targets in prop::collection::vec(-5.0f32..5.0, 1..6),
    ) {
        let t = Array1::from_vec(targets);
        let lo = t.mapv(|v| v - 6.0);
        let hi = t.mapv(|v| v + 6.0);
        let roots = bisect(|x| &t - x, &lo, &hi, 1e-4).unwrap();
        for i in 0..t.len() {
            prop_assert!((roots[i] - t[i]).abs() <= 1e-3);
        }
    }

    #[test]
    fn lambda_grows_with_visits(
        c_puct in 0.1f32..10.0,
        n1 in 0.0f32..1e5,
        n2 in 0.0f32..1e5,
        n_actions in 1usize..64,
    ) {
        let (small, large) = if n1 <= n2 { (n1, n2) } else { (n2, n1) };
        prop_assert!(lambda_n(c_puct, small, n_actions) <= lambda_n(c_puct, large, n_actions) + 1e-6);
        prop_assert!(lambda_n(c_puct, large, n_actions) < c_puct);
    }
}
