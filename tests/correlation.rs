use outranking_engine::{
    ordinal_correlation, ranking_consensus_quality, CorrelationKind, Objective, OutrankingBuilder,
    OutrankingDigraph, PerformanceTableau, Relation,
};

fn roy66() -> PerformanceTableau {
    PerformanceTableau::from_json_str(include_str!("fixtures/roy66.json")).unwrap()
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn digraph(tableau: PerformanceTableau) -> OutrankingDigraph {
    OutrankingBuilder::new().tableau(tableau).build().unwrap()
}

#[test]
fn relation_correlates_perfectly_with_itself() {
    let g = digraph(roy66());
    let index = g.correlation_with(g.relation()).unwrap();
    assert!((index.correlation - 1.0).abs() < 1e-12);
    assert!((index.determination - g.determinateness() / 100.0).abs() < 1e-9);
}

#[test]
fn marginal_correlations_are_bounded_and_sorted() {
    let g = digraph(roy66());
    let marginals = g.marginal_versus_global(None).unwrap();
    assert_eq!(marginals.len(), 5);
    for m in &marginals {
        assert!((-1.0..=1.0).contains(&m.index.correlation), "{m:?}");
        assert!((0.0..=1.0).contains(&m.index.determination), "{m:?}");
        assert!(m.index.valued().abs() <= m.index.determination + 1e-12);
    }
    assert!(marginals
        .windows(2)
        .all(|w| w[0].index.correlation >= w[1].index.correlation));
    let total: f64 = marginals.iter().map(|m| m.weight).sum();
    assert!((total - 1.0).abs() < 1e-12);
    let g1 = marginals.iter().find(|m| m.id == "g1").unwrap();
    assert!((g1.weight - 3.0 / 11.0).abs() < 1e-12);
}

#[test]
fn consensus_quality_summarizes_the_marginals() {
    let g = digraph(roy66());
    let q = g.consensus_quality(CorrelationKind::Ordinal).unwrap();
    assert_eq!(q.marginals.len(), 5);
    assert!(q.mean <= 1.0 && q.mean >= -1.0);
    assert!(q.std_dev >= 0.0);
    assert!((q.fairness() - (q.mean - q.std_dev)).abs() < 1e-12);
}

#[test]
fn ranking_consensus_quality_prefers_a_consistent_ranking() {
    let good = ranking_consensus_quality(roy66(), &ids(&["a6", "a5", "a4", "a1", "a2", "a3"])).unwrap();
    let bad = ranking_consensus_quality(roy66(), &ids(&["a3", "a2", "a1", "a4", "a5", "a6"])).unwrap();
    assert_eq!(good.kind, CorrelationKind::Valued);
    assert!(good.mean > bad.mean);
    assert!(good.mean > 0.0);
}

#[test]
fn ranking_relation_against_an_incomplete_ranking_is_incomparable() {
    let g = digraph(roy66());
    let partial = Relation::from_ranking(&ids(&["a1", "a2"]));
    assert!(g.correlation_with(&partial).is_err());
    assert!(ordinal_correlation(&partial, g.relation()).is_err());
}

#[test]
fn objectives_are_correlated_as_groups_of_criteria() {
    let mut t = roy66();
    t.objectives = vec![
        Objective {
            id: "heavy".into(),
            name: None,
            criteria: ids(&["g1", "g2", "g3"]),
            weight: 0.0,
        },
        Objective {
            id: "light".into(),
            name: None,
            criteria: ids(&["g4", "g5"]),
            weight: 0.0,
        },
    ];
    t.set_objective_weights();
    assert_eq!(t.objectives[0].weight, 9.0);
    let g = digraph(t);
    let objectives = g.objective_versus_global(None).unwrap();
    assert_eq!(objectives.len(), 2);
    let heavy = objectives.iter().find(|o| o.id == "heavy").unwrap();
    assert!((heavy.weight - 9.0 / 11.0).abs() < 1e-12);
    for o in &objectives {
        assert!((-1.0..=1.0).contains(&o.index.correlation));
    }
}
