//! Fixed-effects design matrix with named terms.
//!
//! Treatment coding: `condition` is 1 for treatment, `time` is 1 for post, and
//! `condition:time` is their product. Coefficients are addressed by term
//! name, never by column position.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::dataset::Dataset;

/// Intercept term name.
pub const INTERCEPT: &str = "(Intercept)";
/// Between-subjects factor term name.
pub const CONDITION: &str = "condition";
/// Within-subjects factor term name.
pub const TIME: &str = "time";
/// Difference-in-difference term name.
pub const INTERACTION: &str = "condition:time";

/// Model matrix, response, and subject grouping for one dataset.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    terms: Vec<&'static str>,
    x: DMatrix<f64>,
    y: DVector<f64>,
    groups: Vec<usize>,
    n_groups: usize,
}

impl DesignMatrix {
    /// Build `y ~ condition * time` with subjects as grouping factor.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let terms = vec![INTERCEPT, CONDITION, TIME, INTERACTION];
        let n = dataset.len();

        let mut index: BTreeMap<u32, usize> = BTreeMap::new();
        let mut groups = Vec::with_capacity(n);
        for obs in dataset.iter() {
            let next = index.len();
            groups.push(*index.entry(obs.subject_id).or_insert(next));
        }

        let rows = dataset.observations();
        let x = DMatrix::from_fn(n, terms.len(), |i, j| {
            let c = rows[i].condition.indicator();
            let t = rows[i].time.indicator();
            match j {
                0 => 1.0,
                1 => c,
                2 => t,
                _ => c * t,
            }
        });
        let y = DVector::from_iterator(n, rows.iter().map(|o| o.value));

        Self {
            terms,
            x,
            y,
            groups,
            n_groups: index.len(),
        }
    }

    /// Term names in column order.
    pub fn terms(&self) -> &[&'static str] {
        &self.terms
    }

    /// Column of a named term.
    pub fn term_index(&self, name: &str) -> Option<usize> {
        self.terms.iter().position(|t| *t == name)
    }

    /// Model matrix (observations x terms).
    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// Response vector.
    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    /// Zero-based group index of each row.
    pub fn groups(&self) -> &[usize] {
        &self.groups
    }

    /// Number of grouping levels (subjects).
    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    /// Number of observations.
    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    /// Number of fixed-effect terms.
    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// For each column: true when it is constant within every subject.
    pub fn between_subject(&self) -> Vec<bool> {
        let mut first: Vec<Option<f64>> = vec![None; self.n_groups];
        (0..self.n_terms())
            .map(|j| {
                first.iter_mut().for_each(|f| *f = None);
                self.groups.iter().enumerate().all(|(i, &g)| {
                    let v = self.x[(i, j)];
                    match first[g] {
                        None => {
                            first[g] = Some(v);
                            true
                        }
                        Some(f) => f == v,
                    }
                })
            })
            .collect()
    }
}
