//! Long-format datasets for the 2x2 mixed design.
//!
//! Each group's wide (pre, post) sample becomes two rows per subject. The
//! treatment group's subject ids are offset by the control group's size so
//! ids are unique across the pooled dataset.
//!
//! # Level order
//!
//! `Time::Pre` and `Condition::Control` are the reference levels. The model
//! matrix codes the other level as 1, so the fitted `time` coefficient is the
//! control arm's pre-to-post change and `condition:time` is how much larger
//! that change is in the treatment arm. Swapping either reference flips the
//! sign of the interaction without changing its p-value.
//!
//! # Lifetime
//!
//! A power trial builds one dataset, fits it, and drops it. Datasets built
//! with [`SamplingMode::Empirical`] are the exception: their cell moments
//! match the design exactly, which is what a plot of the design should show,
//! so [`Dataset::cell_summaries`] exists for that consumer.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::PreparedDesign;
use crate::statistics::{draw_group, SamplingMode};
use crate::types::{Condition, SampleMatrix, Time};

/// One measurement of one subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Subject identifier, unique across the dataset.
    pub subject_id: u32,
    /// Measurement occasion.
    pub time: Time,
    /// Arm the subject belongs to.
    pub condition: Condition,
    /// Outcome value.
    pub value: f64,
}

/// Pooled long-format dataset: exactly one pre and one post row per subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    observations: Vec<Observation>,
    n_control: usize,
    n_treatment: usize,
}

/// Descriptive statistics for one (condition, time) cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    /// Arm.
    pub condition: Condition,
    /// Occasion.
    pub time: Time,
    /// Number of observations.
    pub n: usize,
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation (n-1 denominator).
    pub sd: f64,
}

impl Dataset {
    /// Reshape two wide samples into one long dataset.
    ///
    /// Control subjects get ids `1..=n_control`, treatment subjects
    /// `n_control + 1..=n_control + n_treatment`. Rows are subject-major with
    /// `pre` before `post`.
    pub fn assemble(control: &SampleMatrix, treatment: &SampleMatrix) -> Result<Self> {
        let n_control = control.nrows();
        let n_treatment = treatment.nrows();
        if n_control == 0 {
            return Err(Error::invalid("control.n", 0, "group sample is empty"));
        }
        if n_treatment == 0 {
            return Err(Error::invalid("treatment.n", 0, "group sample is empty"));
        }
        let total = n_control + n_treatment;
        if u32::try_from(total).is_err() {
            return Err(Error::invalid("n", total, "too many subjects for u32 ids"));
        }

        let mut observations = Vec::with_capacity(2 * total);
        push_long(&mut observations, control, Condition::Control, 0);
        push_long(&mut observations, treatment, Condition::Treatment, n_control as u32);

        let dataset = Self {
            observations,
            n_control,
            n_treatment,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Build from arbitrary rows, enforcing the dataset invariants.
    pub fn from_observations(observations: Vec<Observation>) -> Result<Self> {
        let mut dataset = Self {
            observations,
            n_control: 0,
            n_treatment: 0,
        };
        let subjects = dataset.subject_table()?;
        dataset.n_control = subjects
            .values()
            .filter(|c| **c == Condition::Control)
            .count();
        dataset.n_treatment = subjects.len() - dataset.n_control;
        Ok(dataset)
    }

    /// Draw both groups from a prepared design and assemble them.
    ///
    /// The control arm is drawn first, then the treatment arm, from the same
    /// generator; a fixed-seed generator therefore reproduces the dataset.
    /// Sampling errors are re-labelled with the arm they came from
    /// (`control.n`, `treatment.covariance`, ...).
    pub fn simulate<R: Rng + ?Sized>(
        design: &PreparedDesign,
        mode: SamplingMode,
        rng: &mut R,
    ) -> Result<Self> {
        let params = design.params();
        let control = draw_group(
            params.control.n,
            &params.control.mean(),
            design.covariance(Condition::Control),
            mode,
            rng,
        )
        .map_err(|e| prefix(e, Condition::Control))?;
        let treatment = draw_group(
            params.treatment.n,
            &params.treatment.mean(),
            design.covariance(Condition::Treatment),
            mode,
            rng,
        )
        .map_err(|e| prefix(e, Condition::Treatment))?;
        Self::assemble(&control, &treatment)
    }

    /// Empirical-mode dataset whose cell moments equal the design's.
    pub fn empirical<R: Rng + ?Sized>(design: &PreparedDesign, rng: &mut R) -> Result<Self> {
        Self::simulate(design, SamplingMode::Empirical, rng)
    }

    /// All rows in assembly order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Number of distinct subjects.
    pub fn n_subjects(&self) -> usize {
        self.n_control + self.n_treatment
    }

    /// Number of subjects in one arm.
    pub fn n_in(&self, condition: Condition) -> usize {
        match condition {
            Condition::Control => self.n_control,
            Condition::Treatment => self.n_treatment,
        }
    }

    /// Mean and SD for every (condition, time) cell, in level order.
    pub fn cell_summaries(&self) -> Vec<CellSummary> {
        let mut out = Vec::with_capacity(4);
        for condition in Condition::LEVELS {
            for time in Time::LEVELS {
                let values: Vec<f64> = self
                    .iter()
                    .filter(|o| o.condition == condition && o.time == time)
                    .map(|o| o.value)
                    .collect();
                let n = values.len();
                let mean = values.iter().sum::<f64>() / n.max(1) as f64;
                let sd = if n > 1 {
                    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                    (ss / (n - 1) as f64).sqrt()
                } else {
                    f64::NAN
                };
                out.push(CellSummary {
                    condition,
                    time,
                    n,
                    mean,
                    sd,
                });
            }
        }
        out
    }

    /// Check id uniqueness and the one-pre-one-post rule.
    pub fn validate(&self) -> Result<()> {
        let subjects = self.subject_table()?;
        if subjects.len() != self.n_subjects() {
            return Err(Error::invalid(
                "subject_id",
                subjects.len(),
                format!("expected {} distinct subjects", self.n_subjects()),
            ));
        }
        Ok(())
    }

    fn subject_table(&self) -> Result<BTreeMap<u32, Condition>> {
        #[derive(Default)]
        struct Seen {
            condition: Option<Condition>,
            pre: usize,
            post: usize,
        }

        let mut seen: BTreeMap<u32, Seen> = BTreeMap::new();
        for obs in &self.observations {
            if !obs.value.is_finite() {
                return Err(Error::invalid(
                    format!("value[subject {}, {}]", obs.subject_id, obs.time),
                    obs.value,
                    "must be finite",
                ));
            }
            let entry = seen.entry(obs.subject_id).or_default();
            match entry.condition {
                None => entry.condition = Some(obs.condition),
                Some(c) if c != obs.condition => {
                    return Err(Error::invalid(
                        "subject_id",
                        obs.subject_id,
                        "subject appears in both conditions",
                    ));
                }
                Some(_) => {}
            }
            match obs.time {
                Time::Pre => entry.pre += 1,
                Time::Post => entry.post += 1,
            }
        }

        let mut table = BTreeMap::new();
        for (id, s) in seen {
            if s.pre != 1 || s.post != 1 {
                return Err(Error::invalid(
                    "subject_id",
                    id,
                    format!("needs exactly one pre and one post row (has {} pre, {} post)", s.pre, s.post),
                ));
            }
            if let Some(c) = s.condition {
                table.insert(id, c);
            }
        }
        Ok(table)
    }
}

fn push_long(out: &mut Vec<Observation>, sample: &SampleMatrix, condition: Condition, offset: u32) {
    for (i, row) in sample.row_iter().enumerate() {
        let subject_id = offset + i as u32 + 1;
        for (col, time) in Time::LEVELS.into_iter().enumerate() {
            out.push(Observation {
                subject_id,
                time,
                condition,
                value: row[col],
            });
        }
    }
}

fn prefix(err: Error, condition: Condition) -> Error {
    match err {
        Error::InvalidParameter { name, value, reason } => Error::InvalidParameter {
            name: format!("{condition}.{name}"),
            value,
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{DesignParameters, GroupParameters};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::collections::HashMap;

    fn wide(n: usize, base: f64) -> SampleMatrix {
        SampleMatrix::from_fn(n, |i, j| base + i as f64 + 0.5 * j as f64)
    }

    #[test]
    fn test_assemble_40_38() {
        let ds = Dataset::assemble(&wide(40, 0.0), &wide(38, 100.0)).unwrap();
        assert_eq!(ds.len(), 156);
        assert_eq!(ds.n_subjects(), 78);

        let mut counts: HashMap<u32, Vec<Time>> = HashMap::new();
        for o in ds.iter() {
            counts.entry(o.subject_id).or_default().push(o.time);
        }
        assert_eq!(counts.len(), 78);
        for times in counts.values() {
            assert_eq!(times.len(), 2);
            assert!(times.contains(&Time::Pre));
            assert!(times.contains(&Time::Post));
        }
    }

    #[test]
    fn test_treatment_ids_are_offset() {
        let ds = Dataset::assemble(&wide(3, 0.0), &wide(2, 10.0)).unwrap();
        let treated: Vec<u32> = ds
            .iter()
            .filter(|o| o.condition == Condition::Treatment)
            .map(|o| o.subject_id)
            .collect();
        assert_eq!(treated, vec![4, 4, 5, 5]);

        // Values land in the right time column.
        let first = &ds.observations()[0];
        let second = &ds.observations()[1];
        assert_eq!((first.time, first.value), (Time::Pre, 0.0));
        assert_eq!((second.time, second.value), (Time::Post, 0.5));
    }

    #[test]
    fn test_from_observations_rejects_duplicates() {
        let mut rows = Dataset::assemble(&wide(3, 0.0), &wide(3, 0.0))
            .unwrap()
            .observations()
            .to_vec();
        rows[1].time = Time::Pre;
        assert!(Dataset::from_observations(rows).is_err());
    }

    #[test]
    fn test_from_observations_rejects_condition_switch() {
        let mut rows = Dataset::assemble(&wide(3, 0.0), &wide(3, 0.0))
            .unwrap()
            .observations()
            .to_vec();
        rows[1].condition = Condition::Treatment;
        assert!(Dataset::from_observations(rows).is_err());
    }

    #[test]
    fn test_from_observations_counts_arms() {
        let rows = Dataset::assemble(&wide(4, 0.0), &wide(6, 0.0))
            .unwrap()
            .observations()
            .to_vec();
        let ds = Dataset::from_observations(rows).unwrap();
        assert_eq!(ds.n_in(Condition::Control), 4);
        assert_eq!(ds.n_in(Condition::Treatment), 6);
    }

    #[test]
    fn test_empirical_cell_summaries_match_design() {
        let control = GroupParameters::new(40, (3.0, 3.0), (1.0, 1.5), 0.75);
        let treatment = GroupParameters::new(38, (3.0, 3.5), (1.0, 1.0), 0.6);
        let design = DesignParameters::new(control, treatment).prepare().unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);

        let ds = Dataset::empirical(&design, &mut rng).unwrap();
        let cells = ds.cell_summaries();
        assert_eq!(cells.len(), 4);

        let expect = [
            (Condition::Control, Time::Pre, 40, 3.0, 1.0),
            (Condition::Control, Time::Post, 40, 3.0, 1.5),
            (Condition::Treatment, Time::Pre, 38, 3.0, 1.0),
            (Condition::Treatment, Time::Post, 38, 3.5, 1.0),
        ];
        for (cell, (c, t, n, mean, sd)) in cells.iter().zip(expect) {
            assert_eq!((cell.condition, cell.time, cell.n), (c, t, n));
            assert!((cell.mean - mean).abs() < 1e-9, "{cell:?}");
            assert!((cell.sd - sd).abs() < 1e-9, "{cell:?}");
        }
    }

    #[test]
    fn test_simulate_prefixes_group_errors() {
        let control = GroupParameters::new(2, (0.0, 0.0), (1.0, 1.0), 0.0);
        let treatment = GroupParameters::new(5, (0.0, 0.0), (1.0, 1.0), 0.0);
        let design = DesignParameters::new(control, treatment).prepare().unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        match Dataset::empirical(&design, &mut rng) {
            Err(Error::InvalidParameter { name, .. }) => assert_eq!(name, "control.n"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
