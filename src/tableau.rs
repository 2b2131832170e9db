//! Performance tableau: alternatives evaluated on weighted criteria.
//!
//! The tableau is treated as an immutable input by the engine. Construction
//! helpers exist for fixtures and callers; the engine itself only reads.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{OutrankingError, Result};

/// Sentinel for "not evaluated" used when a tableau does not declare its own.
pub const DEFAULT_NA: f64 = -999.0;

fn default_na() -> f64 {
    DEFAULT_NA
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Alternative {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            comment: None,
        }
    }
}

/// Affine threshold `constant + slope * reference`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub constant: f64,
    #[serde(default)]
    pub slope: f64,
}

impl Threshold {
    pub fn constant(constant: f64) -> Self {
        Self { constant, slope: 0.0 }
    }

    pub fn affine(constant: f64, slope: f64) -> Self {
        Self { constant, slope }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub ind: Option<Threshold>,
    #[serde(default)]
    pub weak_preference: Option<Threshold>,
    #[serde(default)]
    pub pref: Option<Threshold>,
    #[serde(default)]
    pub weak_veto: Option<Threshold>,
    #[serde(default)]
    pub veto: Option<Threshold>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceDirection {
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Signed significance: positive criteria are maximized, negative ones minimized.
    pub weight: f64,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub scale: Scale,
    #[serde(default)]
    pub preference_direction: Option<PreferenceDirection>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl Criterion {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            weight,
            objective: None,
            scale: Scale::default(),
            preference_direction: None,
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    /// Negative weights minimize; a zero weight follows the declared preference direction.
    pub fn is_minimized(&self) -> bool {
        self.weight < 0.0
            || (self.weight == 0.0 && self.preference_direction == Some(PreferenceDirection::Min))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub criteria: Vec<String>,
    /// Sum of the member criteria weights; see [`PerformanceTableau::set_objective_weights`].
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTableau {
    #[serde(default)]
    pub name: String,
    pub alternatives: Vec<Alternative>,
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    /// `criterion id -> alternative id -> value`.
    pub evaluation: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default = "default_na")]
    pub na: f64,
}

impl PerformanceTableau {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alternatives: Vec::new(),
            criteria: Vec::new(),
            objectives: Vec::new(),
            evaluation: BTreeMap::new(),
            na: DEFAULT_NA,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let tableau: Self = serde_json::from_str(raw)?;
        tableau.validate()?;
        Ok(tableau)
    }

    pub fn add_alternative(&mut self, alternative: Alternative) -> &mut Self {
        self.alternatives.push(alternative);
        self
    }

    pub fn add_criterion(&mut self, criterion: Criterion) -> &mut Self {
        self.criteria.push(criterion);
        self
    }

    pub fn set_evaluation(
        &mut self,
        criterion: impl Into<String>,
        alternative: impl Into<String>,
        value: f64,
    ) -> &mut Self {
        self.evaluation
            .entry(criterion.into())
            .or_default()
            .insert(alternative.into(), value);
        self
    }

    /// Evaluation of `alternative` on `criterion`, `None` when missing or NA.
    pub fn evaluation(&self, criterion: &str, alternative: &str) -> Option<f64> {
        let value = *self.evaluation.get(criterion)?.get(alternative)?;
        if value == self.na || !value.is_finite() {
            None
        } else {
            Some(value)
        }
    }

    pub fn alternative_ids(&self) -> Vec<String> {
        self.alternatives.iter().map(|a| a.id.clone()).collect()
    }

    pub fn criterion(&self, id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    /// `W = Σ |w_c|`.
    pub fn sum_weights(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight.abs()).sum()
    }

    /// Criteria grouped by equal absolute weight, classes in increasing weight order.
    pub fn weight_preorder(&self) -> Vec<Vec<String>> {
        let mut weights: Vec<(f64, &str)> = self
            .criteria
            .iter()
            .map(|c| (c.weight.abs(), c.id.as_str()))
            .collect();
        weights.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        let mut preorder: Vec<Vec<String>> = Vec::new();
        let mut current: Option<f64> = None;
        for (w, id) in weights {
            match current {
                Some(cw) if cw == w => {
                    if let Some(class) = preorder.last_mut() {
                        class.push(id.to_string());
                    }
                }
                _ => {
                    preorder.push(vec![id.to_string()]);
                    current = Some(w);
                }
            }
        }
        preorder
    }

    /// Reset every objective weight to the sum of its criteria weights.
    pub fn set_objective_weights(&mut self) {
        let weights: HashMap<&str, f64> = self
            .criteria
            .iter()
            .map(|c| (c.id.as_str(), c.weight))
            .collect();
        for objective in &mut self.objectives {
            objective.weight = objective
                .criteria
                .iter()
                .filter_map(|g| weights.get(g.as_str()))
                .sum();
        }
    }

    /// Share of (criterion, alternative) cells that are not evaluated.
    pub fn missing_data_proportion(&self) -> f64 {
        let cells = self.criteria.len() * self.alternatives.len();
        if cells == 0 {
            return 0.0;
        }
        let missing = self
            .criteria
            .iter()
            .flat_map(|c| {
                self.alternatives
                    .iter()
                    .filter(move |a| self.evaluation(&c.id, &a.id).is_none())
            })
            .count();
        missing as f64 / cells as f64
    }

    /// Structural checks: unique ids, evaluation and objective references, finite weights.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for a in &self.alternatives {
            if !seen.insert(a.id.as_str()) {
                return Err(OutrankingError::DuplicateId {
                    kind: "alternative",
                    id: a.id.clone(),
                });
            }
        }
        let mut criteria_ids = HashSet::new();
        for c in &self.criteria {
            if !criteria_ids.insert(c.id.as_str()) {
                return Err(OutrankingError::DuplicateId {
                    kind: "criterion",
                    id: c.id.clone(),
                });
            }
            if !c.weight.is_finite() {
                return Err(OutrankingError::InvalidTableau(format!(
                    "criterion {} has a non-finite weight",
                    c.id
                )));
            }
            match c.preference_direction {
                Some(PreferenceDirection::Min) if c.weight > 0.0 => warn!(
                    criterion = %c.id,
                    "preference direction 'min' contradicts a positive weight; the weight sign wins"
                ),
                Some(PreferenceDirection::Max) if c.weight < 0.0 => warn!(
                    criterion = %c.id,
                    "preference direction 'max' contradicts a negative weight; the weight sign wins"
                ),
                _ => {}
            }
        }
        for g in self.evaluation.keys() {
            if !criteria_ids.contains(g.as_str()) {
                return Err(OutrankingError::UnknownCriterion { id: g.clone() });
            }
        }
        let mut objective_ids = HashSet::new();
        for obj in &self.objectives {
            if !objective_ids.insert(obj.id.as_str()) {
                return Err(OutrankingError::DuplicateId {
                    kind: "objective",
                    id: obj.id.clone(),
                });
            }
            for g in &obj.criteria {
                if !criteria_ids.contains(g.as_str()) {
                    return Err(OutrankingError::UnknownCriterion { id: g.clone() });
                }
            }
        }
        Ok(())
    }

    /// Partial tableau restricted to the given alternatives, criteria and objectives.
    ///
    /// An objectives subset keeps the criteria of the selected objectives; when
    /// a criteria subset is given as well, each of its criteria must belong to
    /// one of the selected objectives.
    pub fn restrict(
        &self,
        actions_subset: Option<&[String]>,
        criteria_subset: Option<&[String]>,
        objectives_subset: Option<&[String]>,
    ) -> Result<Self> {
        let alternatives: Vec<Alternative> = match actions_subset {
            Some(ids) => {
                let known: HashSet<&str> = self.alternatives.iter().map(|a| a.id.as_str()).collect();
                for id in ids {
                    if !known.contains(id.as_str()) {
                        return Err(OutrankingError::UnknownAlternative { id: id.clone() });
                    }
                }
                let keep: HashSet<&str> = ids.iter().map(String::as_str).collect();
                self.alternatives
                    .iter()
                    .filter(|a| keep.contains(a.id.as_str()))
                    .cloned()
                    .collect()
            }
            None => self.alternatives.clone(),
        };

        let mut objectives = self.objectives.clone();
        let mut allowed: Option<HashSet<String>> = None;
        if let Some(ids) = objectives_subset {
            for id in ids {
                if !self.objectives.iter().any(|o| &o.id == id) {
                    return Err(OutrankingError::UnknownObjective { id: id.clone() });
                }
            }
            objectives.retain(|o| ids.contains(&o.id));
            allowed = Some(
                objectives
                    .iter()
                    .flat_map(|o| o.criteria.iter().cloned())
                    .collect(),
            );
        }
        if let Some(ids) = criteria_subset {
            for id in ids {
                if self.criterion(id).is_none() {
                    return Err(OutrankingError::UnknownCriterion { id: id.clone() });
                }
                if let Some(allowed) = &allowed {
                    if !allowed.contains(id) {
                        return Err(OutrankingError::IncompatibleSubset {
                            criterion: id.clone(),
                        });
                    }
                }
            }
            allowed = Some(ids.iter().cloned().collect());
        }

        let criteria: Vec<Criterion> = match &allowed {
            Some(keep) => self
                .criteria
                .iter()
                .filter(|c| keep.contains(&c.id))
                .cloned()
                .collect(),
            None => self.criteria.clone(),
        };
        let kept_criteria: HashSet<&str> = criteria.iter().map(|c| c.id.as_str()).collect();
        let kept_alternatives: HashSet<&str> = alternatives.iter().map(|a| a.id.as_str()).collect();

        let evaluation = self
            .evaluation
            .iter()
            .filter(|(g, _)| kept_criteria.contains(g.as_str()))
            .map(|(g, row)| {
                let row = row
                    .iter()
                    .filter(|(a, _)| kept_alternatives.contains(a.as_str()))
                    .map(|(a, v)| (a.clone(), *v))
                    .collect();
                (g.clone(), row)
            })
            .collect();

        for obj in &mut objectives {
            obj.criteria.retain(|g| kept_criteria.contains(g.as_str()));
        }
        objectives.retain(|o| !o.criteria.is_empty());

        let mut partial = Self {
            name: format!("partial-{}", self.name),
            alternatives,
            criteria,
            objectives,
            evaluation,
            na: self.na,
        };
        partial.set_objective_weights();
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PerformanceTableau {
        let mut t = PerformanceTableau::new("sample");
        for id in ["a", "b", "c"] {
            t.add_alternative(Alternative::new(id));
        }
        t.add_criterion(Criterion::new("g1", 3.0).with_objective("eco"));
        t.add_criterion(Criterion::new("g2", -1.0).with_objective("eco"));
        t.add_criterion(Criterion::new("g3", 3.0).with_objective("soc"));
        t.objectives = vec![
            Objective {
                id: "eco".into(),
                name: None,
                criteria: vec!["g1".into(), "g2".into()],
                weight: 0.0,
            },
            Objective {
                id: "soc".into(),
                name: None,
                criteria: vec!["g3".into()],
                weight: 0.0,
            },
        ];
        for (g, a, v) in [
            ("g1", "a", 1.0),
            ("g1", "b", 2.0),
            ("g1", "c", DEFAULT_NA),
            ("g2", "a", 5.0),
            ("g3", "b", 4.0),
        ] {
            t.set_evaluation(g, a, v);
        }
        t
    }

    #[test]
    fn na_sentinel_and_missing_cells_read_as_none() {
        let t = sample();
        assert_eq!(t.evaluation("g1", "a"), Some(1.0));
        assert_eq!(t.evaluation("g1", "c"), None);
        assert_eq!(t.evaluation("g2", "b"), None);
        assert!((t.missing_data_proportion() - 5.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn weight_preorder_groups_equal_absolute_weights() {
        let t = sample();
        assert_eq!(t.sum_weights(), 7.0);
        assert_eq!(
            t.weight_preorder(),
            vec![vec!["g2".to_string()], vec!["g1".to_string(), "g3".to_string()]]
        );
    }

    #[test]
    fn objective_weights_sum_signed_criterion_weights() {
        let mut t = sample();
        t.set_objective_weights();
        assert_eq!(t.objectives[0].weight, 2.0);
        assert_eq!(t.objectives[1].weight, 3.0);
    }

    #[test]
    fn restrict_by_objective_keeps_member_criteria() {
        let t = sample();
        let part = t
            .restrict(
                Some(&["a".to_string(), "b".to_string()][..]),
                None,
                Some(&["eco".to_string()][..]),
            )
            .unwrap();
        assert_eq!(part.alternative_ids(), vec!["a", "b"]);
        let ids: Vec<&str> = part.criteria.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2"]);
        assert_eq!(part.objectives.len(), 1);
        assert_eq!(part.objectives[0].weight, 2.0);
        assert!(part.evaluation("g1", "c").is_none());
    }

    #[test]
    fn criteria_outside_selected_objectives_are_incompatible() {
        let t = sample();
        let err = t
            .restrict(
                None,
                Some(&["g3".to_string()][..]),
                Some(&["eco".to_string()][..]),
            )
            .unwrap_err();
        assert!(matches!(err, OutrankingError::IncompatibleSubset { criterion } if criterion == "g3"));
    }

    #[test]
    fn validate_rejects_duplicates_and_unknown_references() {
        let mut t = sample();
        t.add_alternative(Alternative::new("a"));
        assert!(matches!(t.validate(), Err(OutrankingError::DuplicateId { .. })));

        let mut t = sample();
        t.set_evaluation("g9", "a", 1.0);
        assert!(matches!(t.validate(), Err(OutrankingError::UnknownCriterion { .. })));
    }

    #[test]
    fn weight_sign_decides_minimization() {
        assert!(!Criterion::new("g", 2.0).is_minimized());
        assert!(Criterion::new("g", -2.0).is_minimized());
        let mut inert = Criterion::new("g", 0.0);
        assert!(!inert.is_minimized());
        inert.preference_direction = Some(PreferenceDirection::Min);
        assert!(inert.is_minimized());
    }

    #[test]
    fn json_round_trip_uses_default_na() {
        let raw = r#"{
            "alternatives": [{"id": "x"}, {"id": "y"}],
            "criteria": [{"id": "g", "weight": 2.0, "thresholds": {"ind": {"constant": 0.5}}}],
            "evaluation": {"g": {"x": 1.0, "y": -999.0}}
        }"#;
        let t = PerformanceTableau::from_json_str(raw).unwrap();
        assert_eq!(t.na, DEFAULT_NA);
        assert_eq!(t.evaluation("g", "y"), None);
        assert_eq!(t.criteria[0].thresholds.ind, Some(Threshold::constant(0.5)));
    }
}
