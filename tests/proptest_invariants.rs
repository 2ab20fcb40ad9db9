//! Property-based invariant tests for covariance construction, sampling, and
//! dataset assembly.
//!
//! 1. Covariance built from valid SDs and |r| < 1 is symmetric and PD.
//! 2. Empirical draws reproduce the requested moments exactly.
//! 3. Assembled datasets have two rows per subject and unique ids per group.
//! 4. The fitted interaction on empirical data equals the mean contrast.

use did_power::statistics::{draw_group, rows, sample_moments};
use did_power::{
    Condition, CovarianceMatrix, Dataset, DesignParameters, GroupParameters, MixedModel,
    SampleMatrix, SamplingMode, Time, Vector2,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

fn sd() -> impl Strategy<Value = f64> {
    0.1f64..10.0
}

fn correlation() -> impl Strategy<Value = f64> {
    -0.95f64..0.95
}

proptest! {
    #[test]
    fn covariance_is_symmetric_and_positive_definite(
        sd_pre in sd(),
        sd_post in sd(),
        r in correlation(),
    ) {
        let cov = CovarianceMatrix::from_sds(sd_pre, sd_post, r).unwrap();
        let m = cov.matrix();
        prop_assert_eq!(m[(0, 1)], m[(1, 0)]);
        prop_assert!(cov.determinant() >= 0.0);
        prop_assert!(cov.is_positive_definite());
        prop_assert!(cov.cholesky().is_some());
        prop_assert!((cov.correlation() - r).abs() < 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn empirical_draws_match_moments(
        n in 3usize..60,
        sd_pre in 0.5f64..5.0,
        sd_post in 0.5f64..5.0,
        r in -0.9f64..0.9,
        seed in any::<u64>(),
    ) {
        let cov = CovarianceMatrix::from_sds(sd_pre, sd_post, r).unwrap();
        let mean = Vector2::new(1.0, -2.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let sample = draw_group(n, &mean, &cov, SamplingMode::Empirical, &mut rng).unwrap();

        let (m, c) = sample_moments(&rows(&sample)).unwrap();
        prop_assert!((m - mean).norm() < 1e-8, "mean {:?}", m);
        prop_assert!((c - cov.matrix()).norm() < 1e-8 * cov.matrix().norm(), "cov {:?}", c);
    }

    #[test]
    fn assembled_dataset_shape(nc in 2usize..30, nt in 2usize..30) {
        let control = SampleMatrix::from_fn(nc, |i, j| (i * 2 + j) as f64);
        let treatment = SampleMatrix::from_fn(nt, |i, j| 100.0 + (i * 2 + j) as f64);
        let ds = Dataset::assemble(&control, &treatment).unwrap();

        prop_assert_eq!(ds.len(), 2 * (nc + nt));
        prop_assert_eq!(ds.n_subjects(), nc + nt);
        prop_assert_eq!(ds.n_in(Condition::Control), nc);
        prop_assert_eq!(ds.n_in(Condition::Treatment), nt);
        prop_assert!(ds.validate().is_ok());

        for pair in ds.observations().chunks(2) {
            prop_assert_eq!(pair[0].subject_id, pair[1].subject_id);
            prop_assert_eq!(pair[0].time, Time::Pre);
            prop_assert_eq!(pair[1].time, Time::Post);
            prop_assert_eq!(pair[0].condition, pair[1].condition);
        }
    }

    #[test]
    fn fitted_interaction_equals_mean_contrast(
        n in 5usize..30,
        effect in -2.0f64..2.0,
        r in 0.0f64..0.9,
        seed in any::<u64>(),
    ) {
        let design = DesignParameters::new(
            GroupParameters::new(n, (0.0, 0.0), (1.0, 1.0), r),
            GroupParameters::new(n + 1, (0.0, effect), (1.0, 1.0), r),
        )
        .prepare()
        .unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let ds = Dataset::empirical(&design, &mut rng).unwrap();

        let fit = MixedModel::default().fit(&ds).unwrap();
        let interaction = fit.interaction().unwrap();
        prop_assert!((interaction.estimate - effect).abs() < 1e-8);
        prop_assert!((0.0..=1.0).contains(&interaction.p_value));
    }
}
