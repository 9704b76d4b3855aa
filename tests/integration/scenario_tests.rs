//! Acceptance scenarios: exact duplicates, string-only references, near
//! duplicates with different signatures, and rollback after a failed verify.

use reclaim::analysis::{DuplicateKind, Reachability};
use reclaim::config::Config;
use reclaim::engine::{Engine, RunOptions};
use reclaim::graph::NodeId;
use reclaim::plan::{ActionConfidence, ActionKind, GroupStatus};
use reclaim::RunContext;
use tempfile::TempDir;

fn write_tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, text) in files {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, text).unwrap();
    }
    dir
}

const FORMAT_DATE_JS: &str = "function format_date(d) {\n  const parts = [d.getFullYear(), d.getMonth() + 1, d.getDate()];\n  return parts.map((p) => String(p).padStart(2, \"0\")).join(\"-\");\n}\n";

#[test]
fn scenario_exact_duplicates_pick_one_canonical() {
    let dir = write_tree(&[("a.js", FORMAT_DATE_JS), ("b.js", FORMAT_DATE_JS)]);
    let mut ctx = RunContext::new(Config::default());
    let outcome = Engine::new(RunOptions::new(dir.path())).run(&mut ctx);
    let report = outcome.report;

    let a = NodeId::symbol("a.js", "format_date", 1);
    let b = NodeId::symbol("b.js", "format_date", 1);

    assert_eq!(report.duplicate_clusters.len(), 1);
    let cluster = &report.duplicate_clusters[0];
    assert_eq!(cluster.kind, DuplicateKind::Exact);
    assert_eq!(cluster.members, vec![a.clone(), b.clone()]);

    // Nothing references either copy
    for member in [&a, &b] {
        let candidate = report.removal_candidates.iter().find(|c| &c.node == member).unwrap();
        assert_eq!(candidate.reachability, Reachability::UnreachableCertain);
    }

    let merges: Vec<_> = report.actions.iter().filter(|x| x.kind == ActionKind::Merge).collect();
    assert_eq!(merges.len(), 1);
    assert_eq!(merges[0].subject, b);
    assert_eq!(merges[0].canonical.as_ref(), Some(&a));
    assert_eq!(merges[0].confidence, ActionConfidence::Certain);

    // The canonical copy survives every action of the plan
    assert!(report.actions.iter().all(|x| x.subject != a && x.subject != NodeId::file("a.js")));
}

#[test]
fn scenario_string_only_reference_is_flagged_never_removed() {
    let dir = write_tree(&[
        ("main.py", "import importlib\n\nPLUGINS = [\"csv_export\"]\nfor name in PLUGINS:\n    importlib.import_module(\"plugins.\" + name)\n"),
        ("plugins/csv_export.py", "def run(rows):\n    return rows\n"),
    ]);
    let mut ctx = RunContext::new(Config::default());
    let report = Engine::new(RunOptions::new(dir.path())).run(&mut ctx).report;

    let plugin = NodeId::file("plugins/csv_export.py");
    let candidate = report.removal_candidates.iter().find(|c| c.node == plugin).unwrap();
    assert_eq!(candidate.reachability, Reachability::UnreachableHeuristic);

    let actions: Vec<_> = report
        .actions
        .iter()
        .filter(|a| a.subject.owning_file() == plugin)
        .collect();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].kind, ActionKind::FlagForReview);
    assert_eq!(actions[0].confidence, ActionConfidence::Heuristic);
    assert!(report.actions.iter().all(|a| !a.kind.removes_subject()));
}

fn accumulate(header: &str) -> String {
    let mut text = format!("{}\n", header);
    for i in 0..30 {
        text.push_str(&format!("    total = total + step_{} * weight\n", i));
    }
    text.push_str("    return total\n");
    text
}

#[test]
fn scenario_near_duplicates_with_different_parameters_are_parameterized() {
    let a = accumulate("def accumulate(total, weight):");
    let b = accumulate("def accumulate(total, weight, scale=1):");
    let dir = write_tree(&[("a.py", &a), ("b.py", &b)]);
    let mut config = Config::default();
    config.duplicates.similarity_threshold = 0.8;
    config.duplicates.shingle_size = 5;
    let mut ctx = RunContext::new(config);
    let report = Engine::new(RunOptions::new(dir.path())).run(&mut ctx).report;

    assert_eq!(report.duplicate_clusters.len(), 1);
    let cluster = &report.duplicate_clusters[0];
    assert_eq!(cluster.kind, DuplicateKind::Near);
    assert!(cluster.similarity >= 0.8 && cluster.similarity < 1.0);
    assert!(cluster.signatures_differ);

    assert!(report.actions.iter().all(|x| x.kind != ActionKind::Merge));
    let parameterize = report
        .actions
        .iter()
        .find(|x| x.kind == ActionKind::Parameterize)
        .unwrap();
    assert_eq!(parameterize.subject, NodeId::symbol("b.py", "accumulate", 1));
    assert_eq!(
        parameterize.canonical,
        Some(NodeId::symbol("a.py", "accumulate", 1))
    );
    assert_eq!(parameterize.confidence, ActionConfidence::Heuristic);
    // Never applied automatically
    assert_eq!(report.groups[parameterize.group].status, GroupStatus::Manual);
}

#[cfg(unix)]
#[test]
fn scenario_failed_verification_restores_only_that_group() {
    let dir = write_tree(&[
        ("main.py", "print(1)\n"),
        ("old_a.py", "A = 1\n"),
        ("old_b.py", "B = 2\n# keep the trailing comment\n"),
    ]);
    let mut config = Config::default();
    // Passes as long as old_b.py is present
    config.run.verify_command = Some("test -f old_b.py".to_string());
    let mut ctx = RunContext::new(config);
    let outcome = Engine::new(RunOptions::new(dir.path()).apply()).run(&mut ctx);
    let report = &outcome.report;

    assert!(outcome.error.is_none());
    let status_of = |path: &str| {
        let action = report
            .actions
            .iter()
            .find(|a| a.subject == NodeId::file(path))
            .unwrap();
        report.groups[action.group].status
    };
    assert_eq!(status_of("old_a.py"), GroupStatus::Committed);
    assert_eq!(status_of("old_b.py"), GroupStatus::RolledBack);

    assert!(!dir.path().join("old_a.py").exists());
    assert_eq!(
        std::fs::read(dir.path().join("old_b.py")).unwrap(),
        b"B = 2\n# keep the trailing comment\n"
    );
    assert_eq!(outcome.exit_code(), 1);
}
