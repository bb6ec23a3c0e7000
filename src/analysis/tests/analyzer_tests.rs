use super::*;
use proptest::prelude::*;

fn classifier() -> DomainClassifier {
    DomainClassifier::builtin().unwrap()
}

fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn fourteen_files() -> Vec<String> {
    paths(&[
        "src/api/users.py",
        "src/api/orders.py",
        "src/services/billing.py",
        "src/models/user.py",
        "src/components/UserList.tsx",
        "src/pages/Orders.tsx",
        "src/ui/theme.css",
        "migrations/001_users.sql",
        "migrations/002_orders.sql",
        "database/seed.sql",
        "tests/users_spec.rb",
        "tests/orders_spec.rb",
        "tests/api.rb",
        "tests/helpers.rb",
    ])
}

#[test]
fn too_few_files_and_domains_cites_both_in_order() {
    let files = paths(&["src/api/a.py", "src/api/b.py", "src/api/c.py"]);
    let plan = analyze(&classifier(), &files, &AnalysisThresholds::default(), None);

    assert!(!plan.viable);
    assert!(plan.plan.is_none());
    assert_eq!(plan.recommendation, Recommendation::Sequential);
    assert_eq!(plan.domain_count, 1);
    assert_eq!(
        plan.reason,
        "Not viable: too few files (3 < 5), too few domains (1 < 2)"
    );
}

#[test]
fn single_domain_with_enough_files_cites_domain_threshold() {
    let files = paths(&[
        "src/api/a.py",
        "src/api/b.py",
        "src/api/c.py",
        "src/api/d.py",
        "src/api/e.py",
    ]);
    let plan = analyze(&classifier(), &files, &AnalysisThresholds::default(), None);

    assert!(!plan.viable);
    assert_eq!(plan.reason, "Not viable: too few domains (1 < 2)");
}

#[test]
fn fourteen_files_across_four_domains_is_viable() {
    let plan = analyze(
        &classifier(),
        &fourteen_files(),
        &AnalysisThresholds::default(),
        Some("Order history"),
    );

    assert!(plan.viable, "reason: {}", plan.reason);
    assert_eq!(plan.file_count, 14);
    assert_eq!(plan.domain_count, 4);
    assert_eq!(plan.overlap_pct, 0.0);
    assert_eq!(plan.recommendation, Recommendation::Parallel);
    assert_eq!(plan.reason, "14 files across 4 domains with 0.0% overlap");

    let exec = plan.plan.unwrap();
    let names: Vec<&str> = exec.tasks.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["backend", "database", "frontend", "tests"]);
    assert!(exec.tasks.values().all(|t| !t.files.is_empty()));
    assert_eq!(
        exec.tasks["backend"].task_description,
        "Order history: Backend API implementation (4 files)"
    );
}

#[test]
fn other_files_are_reported_but_never_planned() {
    let mut files = fourteen_files();
    files.push("Cargo.toml".to_string());
    let plan = analyze(&classifier(), &files, &AnalysisThresholds::default(), None);

    assert_eq!(plan.file_count, 15);
    assert_eq!(plan.domain_count, 4);
    assert_eq!(plan.domains[OTHER_DOMAIN], vec!["Cargo.toml"]);
    assert!(!plan.plan.unwrap().tasks.contains_key(OTHER_DOMAIN));
}

#[test]
fn overlap_counts_files_matching_multiple_domains() {
    let files = paths(&["src/app.test.ts", "src/api/a.py", "docs/x.md"]);
    assert_eq!(compute_overlap(&classifier(), &files), 33.3);
    assert_eq!(compute_overlap(&classifier(), &[]), 0.0);
}

#[test]
fn overlap_at_threshold_is_not_viable() {
    let files = paths(&["src/app.test.ts", "src/api/a.py"]);
    let thresholds = AnalysisThresholds {
        min_files: 1,
        min_domains: 1,
        max_overlap_pct: 50.0,
    };
    let plan = analyze(&classifier(), &files, &thresholds, None);

    assert_eq!(plan.overlap_pct, 50.0);
    assert!(!plan.viable);
    assert_eq!(plan.reason, "Not viable: high overlap (50.0% >= 50.0%)");
}

#[test]
fn duplicate_inputs_are_counted_once() {
    let mut files = fourteen_files();
    files.push("src/api/users.py".to_string());
    let plan = analyze(&classifier(), &files, &AnalysisThresholds::default(), None);
    assert_eq!(plan.file_count, 14);
    assert_eq!(plan.domains["backend"].len(), 4);
}

#[test]
fn task_description_pluralizes() {
    assert_eq!(
        task_description(None, "Documentation updates", 1),
        "Documentation updates (1 file)"
    );
    assert_eq!(
        task_description(Some("  "), "Documentation updates", 2),
        "Documentation updates (2 files)"
    );
    assert_eq!(
        task_description(Some("Billing"), "Test suite implementation", 3),
        "Billing: Test suite implementation (3 files)"
    );
}

fn pooled_path() -> impl Strategy<Value = String> {
    (0usize..6, 0u32..30).prop_map(|(kind, n)| match kind {
        0 => format!("src/api/f{n}.py"),
        1 => format!("src/components/c{n}.tsx"),
        2 => format!("migrations/m{n}.sql"),
        3 => format!("tests/t{n}.rb"),
        4 => format!("docs/d{n}.rst"),
        _ => format!("misc/o{n}.bin"),
    })
}

proptest! {
    #[test]
    fn plan_partitions_classified_files(files in prop::collection::vec(pooled_path(), 0..40)) {
        let c = classifier();
        let thresholds = AnalysisThresholds { min_files: 0, min_domains: 0, max_overlap_pct: 100.1 };
        let plan = analyze(&c, &files, &thresholds, None);
        prop_assert!(plan.viable);

        let mut planned: Vec<String> = plan
            .plan
            .unwrap()
            .tasks
            .values()
            .flat_map(|t| t.files.clone())
            .collect();
        planned.sort();

        let mut expected: Vec<String> = dedup_preserving_order(&files)
            .into_iter()
            .filter(|f| c.classify(f) != OTHER_DOMAIN)
            .collect();
        expected.sort();

        prop_assert_eq!(planned, expected);
    }

    #[test]
    fn disjoint_pools_have_exactly_zero_overlap(files in prop::collection::vec(pooled_path(), 0..40)) {
        let plan = analyze(&classifier(), &files, &AnalysisThresholds::default(), None);
        prop_assert_eq!(plan.overlap_pct, 0.0);
    }

    #[test]
    fn below_min_files_is_never_viable(files in prop::collection::vec(pooled_path(), 0..5)) {
        let plan = analyze(&classifier(), &files, &AnalysisThresholds::default(), None);
        prop_assert!(!plan.viable);
        prop_assert!(plan.reason.starts_with("Not viable: too few files"));
    }
}
