use outranking_engine::{
    Alternative, Criterion, OutrankingBuilder, OutrankingConfig, OutrankingDigraph, PerformanceTableau,
    StartMethod, Threshold, ThreadingConfig, Thresholds,
};

/// Deterministic pseudo-random tableau (linear congruential values in 0..100).
fn generated_tableau(alternatives: usize, criteria: usize) -> PerformanceTableau {
    let mut t = PerformanceTableau::new("generated");
    for a in 0..alternatives {
        t.add_alternative(Alternative::new(format!("a{:02}", a + 1)));
    }
    let mut state: u64 = 0x2545_f491;
    let mut next = move || {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        ((state >> 33) % 100) as f64
    };
    for g in 0..criteria {
        let id = format!("g{}", g + 1);
        let weight = if g % 3 == 2 { -2.0 } else { (g % 2 + 1) as f64 };
        t.add_criterion(Criterion::new(id.clone(), weight).with_thresholds(Thresholds {
            ind: Some(Threshold::affine(2.0, 0.01)),
            pref: Some(Threshold::affine(8.0, 0.02)),
            weak_veto: Some(Threshold::constant(45.0)),
            veto: Some(Threshold::constant(60.0)),
            ..Thresholds::default()
        }));
        for a in 0..alternatives {
            t.set_evaluation(id.clone(), format!("a{:02}", a + 1), next());
        }
    }
    t.set_evaluation("g2", "a03", -999.0);
    t
}

fn build(config: OutrankingConfig) -> OutrankingDigraph {
    OutrankingBuilder::new()
        .tableau(generated_tableau(13, 7))
        .config(config)
        .build()
        .unwrap()
}

fn threaded(start_method: StartMethod, temp_dir: Option<std::path::PathBuf>) -> OutrankingConfig {
    OutrankingConfig::default().with_threading(ThreadingConfig {
        enabled: true,
        start_method,
        nbr_cores: Some(4),
        temp_dir,
    })
}

#[test]
fn threaded_build_matches_sequential_build() {
    let sequential = build(OutrankingConfig::default());
    for method in [StartMethod::Spawn, StartMethod::Fork, StartMethod::Forkserver] {
        let parallel = build(threaded(method, None));
        assert_eq!(parallel.relation(), sequential.relation(), "{method:?}");
        assert_eq!(parallel.build_info().start_method, Some(method));
        assert_eq!(parallel.build_info().chunks, 4);
    }
}

#[test]
fn spawn_uses_a_dedicated_pool_of_the_requested_size() {
    let g = build(threaded(StartMethod::Spawn, None));
    assert_eq!(g.build_info().threads, 4);
}

#[test]
fn fork_reports_the_global_pool_size() {
    let mut config = threaded(StartMethod::Fork, None);
    config.threading.nbr_cores = Some(rayon::current_num_threads() + 3);
    let g = build(config);
    assert_eq!(g.build_info().threads, rayon::current_num_threads());
    assert_eq!(g.relation(), build(OutrankingConfig::default()).relation());
}

#[test]
fn threaded_build_skips_ledgers() {
    let g = build(threaded(StartMethod::Spawn, None));
    assert!(g.concordance_relation().is_none());
    assert!(g.vetoes().is_empty());
    assert!(g.counter_vetoes().is_empty());
    assert_eq!(g.large_differences("a01", "a02"), None);
}

#[test]
fn rectangular_build_splits_the_smaller_axis() {
    let initial: Vec<String> = ["a01", "a05", "a09"].iter().map(|s| s.to_string()).collect();
    let base = OutrankingConfig {
        terminal: Some(initial.clone()),
        ..OutrankingConfig::default()
    };
    let sequential = build(base.clone());
    let parallel = build(OutrankingConfig {
        threading: threaded(StartMethod::Spawn, None).threading,
        ..base
    });
    assert_eq!(parallel.relation(), sequential.relation());
    assert_eq!(parallel.relation().cols(), initial.as_slice());
    assert_eq!(parallel.build_info().chunks, 3);
}

#[test]
fn scratch_directory_is_removed_after_the_build() {
    let parent = tempfile::tempdir().unwrap();
    let g = build(threaded(StartMethod::Spawn, Some(parent.path().to_path_buf())));
    assert_eq!(g.order(), 13);
    assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
}

#[test]
fn missing_scratch_parent_is_an_error() {
    let parent = tempfile::tempdir().unwrap();
    let missing = parent.path().join("does-not-exist");
    let err = OutrankingBuilder::new()
        .tableau(generated_tableau(4, 2))
        .config(threaded(StartMethod::Spawn, Some(missing)))
        .build()
        .unwrap_err();
    assert!(matches!(err, outranking_engine::OutrankingError::Scratch(_)));
}

#[test]
fn single_core_falls_back_to_sequential() {
    let mut config = threaded(StartMethod::Spawn, None);
    config.threading.nbr_cores = Some(1);
    let g = build(config);
    assert_eq!(g.build_info().threads, 1);
    assert_eq!(g.build_info().start_method, None);
    assert_eq!(g.relation(), build(OutrankingConfig::default()).relation());
}
