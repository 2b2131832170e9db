//! Valued binary relations over alternatives.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{OutrankingError, Result};
use crate::valuation::ValuationDomain;

/// Rectangular `initial × terminal` valued relation keyed by alternative ids.
///
/// Values are stored row-major; the diagonal (same id on both axes) holds the
/// domain maximum by convention and is skipped by every aggregate statistic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relation {
    domain: ValuationDomain,
    rows: Vec<String>,
    cols: Vec<String>,
    values: Vec<f64>,
    #[serde(skip)]
    row_index: HashMap<String, usize>,
    #[serde(skip)]
    col_index: HashMap<String, usize>,
}

fn index_of(ids: &[String]) -> HashMap<String, usize> {
    ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect()
}

impl Relation {
    /// Relation with every off-diagonal entry at the median and the diagonal at the maximum.
    pub fn indeterminate(domain: ValuationDomain, rows: Vec<String>, cols: Vec<String>) -> Self {
        let mut values = vec![domain.med; rows.len() * cols.len()];
        for (i, x) in rows.iter().enumerate() {
            for (j, y) in cols.iter().enumerate() {
                if x == y {
                    values[i * cols.len() + j] = domain.max;
                }
            }
        }
        Self {
            domain,
            row_index: index_of(&rows),
            col_index: index_of(&cols),
            rows,
            cols,
            values,
        }
    }

    /// Square relation from a best-to-worst ranking: `r(x, y) = max` when x is
    /// ranked before y, `min` otherwise.
    pub fn from_ranking(ranking: &[String]) -> Self {
        let domain = ValuationDomain::normalized();
        let mut rel = Self::indeterminate(domain, ranking.to_vec(), ranking.to_vec());
        for i in 0..ranking.len() {
            for j in 0..ranking.len() {
                if i != j {
                    rel.set_at(i, j, if i < j { domain.max } else { domain.min });
                }
            }
        }
        rel
    }

    /// Rebuild the id lookups, e.g. after deserialization.
    pub fn reindex(&mut self) {
        self.row_index = index_of(&self.rows);
        self.col_index = index_of(&self.cols);
    }

    pub fn domain(&self) -> ValuationDomain {
        self.domain
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn row_position(&self, id: &str) -> Option<usize> {
        self.row_index.get(id).copied()
    }

    pub fn col_position(&self, id: &str) -> Option<usize> {
        self.col_index.get(id).copied()
    }

    pub fn get(&self, x: &str, y: &str) -> Option<f64> {
        let i = self.row_position(x)?;
        let j = self.col_position(y)?;
        Some(self.at(i, j))
    }

    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.cols.len() + j]
    }

    pub fn set_at(&mut self, i: usize, j: usize, value: f64) {
        let width = self.cols.len();
        self.values[i * width + j] = value;
    }

    pub fn is_reflexive(&self, i: usize, j: usize) -> bool {
        self.rows[i] == self.cols[j]
    }

    /// Off-diagonal `(row, col, value)` triples in row-major order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let width = self.cols.len();
        self.values
            .iter()
            .enumerate()
            .map(move |(k, v)| (k / width.max(1), k % width.max(1), *v))
            .filter(move |(i, j, _)| !self.is_reflexive(*i, *j))
    }

    pub fn pair_count(&self) -> usize {
        self.pairs().count()
    }

    /// Number of validated situations, `r(x, y) > med`.
    pub fn size(&self) -> usize {
        let med = self.domain.med;
        self.pairs().filter(|(_, _, v)| *v > med).count()
    }

    /// Mean distance to the median as a percentage of `max - med`.
    pub fn determinateness(&self) -> f64 {
        let n = self.pair_count();
        if n == 0 {
            return 0.0;
        }
        let med = self.domain.med;
        let total: f64 = self.pairs().map(|(_, _, v)| (v - med).abs()).sum();
        total / n as f64 / self.domain.radius() * 100.0
    }

    /// Same relation expressed in `domain`, rounded to `ndigits`.
    pub fn recoded(&self, domain: ValuationDomain, ndigits: u32) -> Self {
        let values = self
            .values
            .iter()
            .map(|v| self.domain.recode_rounded(*v, &domain, ndigits))
            .collect();
        Self {
            domain,
            rows: self.rows.clone(),
            cols: self.cols.clone(),
            values,
            row_index: self.row_index.clone(),
            col_index: self.col_index.clone(),
        }
    }

    pub fn normalized(&self, ndigits: u32) -> Self {
        if self.domain.is_normalized() {
            return self.clone();
        }
        self.recoded(ValuationDomain::normalized(), ndigits)
    }

    /// Both relations are defined on the same row and column alternatives.
    pub fn is_compatible(&self, other: &Relation) -> bool {
        self.rows.len() == other.rows.len()
            && self.cols.len() == other.cols.len()
            && self.rows.iter().all(|x| other.row_index.contains_key(x))
            && self.cols.iter().all(|y| other.col_index.contains_key(y))
    }

    /// Value of `other` at the position of `(i, j)` in `self`.
    pub(crate) fn aligned(&self, other: &Relation, i: usize, j: usize) -> Result<f64> {
        other
            .get(&self.rows[i], &self.cols[j])
            .ok_or(OutrankingError::IncomparableRelations)
    }

    /// Copy a block of rows computed elsewhere; `block[k]` becomes row `first_row + k`.
    pub(crate) fn copy_rows(&mut self, first_row: usize, block: &[Vec<f64>]) {
        let width = self.cols.len();
        for (k, row) in block.iter().enumerate() {
            let start = (first_row + k) * width;
            self.values[start..start + width].copy_from_slice(row);
        }
    }

    /// Copy a block of columns computed elsewhere; `block[k]` becomes column `first_col + k`.
    pub(crate) fn copy_cols(&mut self, first_col: usize, block: &[Vec<f64>]) {
        let width = self.cols.len();
        for (k, col) in block.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                self.values[i * width + first_col + k] = *v;
            }
        }
    }
}
