//! Properties every plan must keep: idempotence, soundness of removals,
//! duplicate symmetry, apply/rollback round trips and confidence monotonicity.

use reclaim::analysis::{
    DuplicateCluster, DuplicateDetector, EntryPointDetector, Reachability, ReachabilityAnalyzer,
};
use reclaim::config::Config;
use reclaim::discovery::{content_hash, FileFinder, Language, SourceFile};
use reclaim::engine::{Engine, RunOptions};
use reclaim::graph::{Graph, GraphBuilder, NodeId, ParallelGraphBuilder};
use reclaim::parser::extract;
use reclaim::plan::{CleanupPlan, GroupStatus, PlanGenerator};
use reclaim::report::Report;
use reclaim::{CancelToken, RunContext};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

fn write_tree(dir: &Path, files: &[(&str, &str)]) {
    for (path, text) in files {
        let full = dir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, text).unwrap();
    }
}

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), files);
    dir
}

/// Content hash of every visible file under `root`
fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, content_hash(&std::fs::read(e.path()).unwrap()))
        })
        .collect()
}

/// A project with live code, dead symbols, a dead import cycle and duplicates
fn mixed_project() -> Vec<(&'static str, String)> {
    let mut report = String::from("def build_report(rows):\n");
    for i in 0..14 {
        report.push_str(&format!("    rows = [r + \"{}\" for r in rows if r]\n", i));
    }
    report.push_str("    return rows\n");

    vec![
        (
            "main.py",
            "from util import used\nfrom reports import build_report\n\nused()\nbuild_report([])\n".to_string(),
        ),
        (
            "util.py",
            "def used():\n    return helper()\n\ndef helper():\n    return 1\n\ndef unused():\n    return stale()\n\ndef stale():\n    return 2\n".to_string(),
        ),
        ("reports.py", report.clone()),
        ("legacy/reports_copy.py", report),
        ("cycle_a.py", "from cycle_b import pong\n\ndef ping():\n    return pong()\n".to_string()),
        ("cycle_b.py", "from cycle_a import ping\n\ndef pong():\n    return ping()\n".to_string()),
        ("lone.py", "VALUE = 3\n".to_string()),
    ]
}

fn mixed_tree() -> TempDir {
    let files = mixed_project();
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, t)| (*p, t.as_str())).collect();
    tree(&borrowed)
}

fn analyze(root: &Path, config: &Config) -> (Graph, CleanupPlan) {
    let cancel = CancelToken::new();
    let scan = FileFinder::new(config).scan(root, &cancel).unwrap();
    let mut cache = reclaim::cache::ExtractionCache::new();
    let graph = ParallelGraphBuilder::new(config)
        .build_from_files(&scan.files, &mut cache, &cancel)
        .unwrap();
    let roots = EntryPointDetector::new(config).detect(&graph);
    let analyzer = ReachabilityAnalyzer::new();
    let result = analyzer.analyze(&graph, &roots);
    let candidates = analyzer.candidates(&graph, &result);
    let clusters = DuplicateDetector::new(&config.duplicates)
        .detect(&graph, &cancel)
        .unwrap();
    let plan = PlanGenerator::new(&config.plan).generate(&graph, &clusters, &candidates);
    (graph, plan)
}

fn dry_report(root: &Path) -> Report {
    let mut ctx = RunContext::new(Config::default());
    Engine::new(RunOptions::new(root)).run(&mut ctx).report
}

#[test]
fn prop_two_dry_runs_agree() {
    let dir = mixed_tree();
    let first = dry_report(dir.path());
    let second = dry_report(dir.path());

    assert!(first.run.complete);
    assert!(!first.actions.is_empty());
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.actions, second.actions);
    assert_eq!(first.groups, second.groups);
    assert_eq!(first.duplicate_clusters, second.duplicate_clusters);
}

#[test]
fn prop_prior_report_detects_no_change() {
    let dir = mixed_tree();
    let out = TempDir::new().unwrap();
    let prior = out.path().join("prior.json");
    dry_report(dir.path()).save(&prior).unwrap();

    let run_with_prior = |path: &Path| {
        let mut options = RunOptions::new(dir.path());
        options.prior = Some(path.to_path_buf());
        let mut ctx = RunContext::new(Config::default());
        Engine::new(options).run(&mut ctx).report
    };

    assert_eq!(run_with_prior(&prior).run.unchanged_since_prior, Some(true));

    std::fs::remove_file(dir.path().join("lone.py")).unwrap();
    assert_eq!(run_with_prior(&prior).run.unchanged_since_prior, Some(false));

    let missing = out.path().join("missing.json");
    let report = run_with_prior(&missing);
    assert!(report.run.complete);
    assert_eq!(report.run.unchanged_since_prior, None);
}

/// `node` is one of `subjects` or lies inside one of them
fn covered(graph: &Graph, subjects: &HashSet<NodeId>, node: &NodeId) -> bool {
    let mut current = Some(node.clone());
    while let Some(id) = current {
        if subjects.contains(&id) {
            return true;
        }
        current = graph.container_of(&id);
    }
    false
}

#[test]
fn prop_removed_nodes_have_no_certain_inbound_from_outside_their_group() {
    let dir = mixed_tree();
    let config = Config::default();
    let (graph, plan) = analyze(dir.path(), &config);

    let mut checked = 0;
    for group in &plan.groups {
        let removed: HashSet<NodeId> = plan
            .actions_in(group.id)
            .into_iter()
            .filter(|a| a.kind.removes_subject())
            .map(|a| a.subject.clone())
            .collect();
        for subject in &removed {
            for (source, edge) in graph.inbound(subject) {
                if edge.is_certain() {
                    assert!(
                        covered(&graph, &removed, source),
                        "{} is removed but referenced by {}",
                        subject,
                        source
                    );
                }
            }
            checked += 1;
        }
    }
    assert!(checked >= 3, "expected several removals, got {}", checked);

    // The dead import cycle is removed as one unit
    let cycle_groups: HashSet<usize> = plan
        .actions
        .iter()
        .filter(|a| a.subject == NodeId::file("cycle_a.py") || a.subject == NodeId::file("cycle_b.py"))
        .map(|a| a.group)
        .collect();
    assert_eq!(cycle_groups.len(), 1);
}

fn clusters_in_order(files: &[(&str, String)]) -> Vec<DuplicateCluster> {
    let config = Config::default();
    let mut builder = GraphBuilder::new(&config);
    for (path, text) in files {
        let file = SourceFile::from_text(*path, Language::Python, text);
        builder.add_file(&file, &extract(&file));
    }
    let graph = builder.build().unwrap();
    DuplicateDetector::new(&config.duplicates)
        .detect(&graph, &CancelToken::new())
        .unwrap()
}

#[test]
fn prop_duplicate_detection_is_symmetric() {
    let body = |extra: &str| {
        let mut text = format!("def merge_rows(left, right{}):\n", extra);
        for i in 0..25 {
            text.push_str(&format!("    left = left + [right[{}] * factor]\n", i));
        }
        text.push_str("    return left\n");
        text
    };
    let files = vec![
        ("a.py", body("")),
        ("b.py", body(", factor=2")),
        ("c.py", body("")),
        ("d.py", body("").replace("    return left\n", "    left.sort()\n    return left\n")),
    ];
    let mut reversed = files.clone();
    reversed.reverse();

    let forward = clusters_in_order(&files);
    let backward = clusters_in_order(&reversed);
    assert!(!forward.is_empty());
    assert_eq!(forward, backward);

    for cluster in &forward {
        for pair in &cluster.pairs {
            assert_eq!(cluster.score(&pair.a, &pair.b), cluster.score(&pair.b, &pair.a));
        }
    }
}

#[cfg(unix)]
#[test]
fn prop_rejected_apply_leaves_tree_untouched() {
    let dir = mixed_tree();
    let before = snapshot(dir.path());

    let mut config = Config::default();
    config.run.verify_command = Some("false".to_string());
    let mut ctx = RunContext::new(config);
    let outcome = Engine::new(RunOptions::new(dir.path()).apply()).run(&mut ctx);

    assert!(outcome.error.is_none());
    assert!(outcome.undo.is_empty());
    assert!(outcome
        .report
        .groups
        .iter()
        .all(|g| g.status != GroupStatus::Committed));
    assert_eq!(snapshot(dir.path()), before);
}

#[cfg(unix)]
#[test]
fn prop_undo_script_restores_committed_groups() {
    let dir = mixed_tree();
    let before = snapshot(dir.path());
    let out = TempDir::new().unwrap();
    let script = out.path().join("undo.sh");

    let mut config = Config::default();
    config.run.verify_command = Some("true".to_string());
    let mut options = RunOptions::new(dir.path()).apply();
    options.undo_script = Some(script.clone());
    let mut ctx = RunContext::new(config);
    let outcome = Engine::new(options).run(&mut ctx);

    assert!(outcome.error.is_none());
    assert!(!outcome.undo.is_empty());
    assert_ne!(snapshot(dir.path()), before);

    let status = std::process::Command::new("sh").arg(&script).status().unwrap();
    assert!(status.success());
    assert_eq!(snapshot(dir.path()), before);
}

fn states(root: &Path) -> (HashSet<NodeId>, BTreeMap<NodeId, Reachability>) {
    let config = Config::default();
    let cancel = CancelToken::new();
    let scan = FileFinder::new(&config).scan(root, &cancel).unwrap();
    let mut cache = reclaim::cache::ExtractionCache::new();
    let graph = ParallelGraphBuilder::new(&config)
        .build_from_files(&scan.files, &mut cache, &cancel)
        .unwrap();
    let roots = EntryPointDetector::new(&config).detect(&graph);
    let result = ReachabilityAnalyzer::new().analyze(&graph, &roots);
    let nodes = graph.node_ids().cloned().collect();
    let states = graph.node_ids().map(|id| (id.clone(), result.state(id))).collect();
    (nodes, states)
}

fn rank(state: Reachability) -> u8 {
    match state {
        Reachability::UnreachableCertain => 0,
        Reachability::UnreachableHeuristic => 1,
        Reachability::Reachable => 2,
    }
}

#[test]
fn prop_added_references_only_raise_confidence() {
    let dir = tree(&[
        ("main.py", "from util import used\n\nused()\n"),
        ("util.py", "def used():\n    pass\n"),
        ("plugins/report.py", "def run():\n    pass\n"),
        ("plugins/export.py", "def run():\n    pass\n"),
    ]);
    let (_, before) = states(dir.path());
    let report = NodeId::file("plugins/report.py");
    let export = NodeId::file("plugins/export.py");
    assert_eq!(before[&report], Reachability::UnreachableCertain);

    // A string mention makes the plugin heuristic
    write_tree(
        dir.path(),
        &[("main.py", "from util import used\n\nused()\nPLUGIN = \"report\"\n")],
    );
    let (nodes, after) = states(dir.path());
    assert_eq!(after[&report], Reachability::UnreachableHeuristic);
    for (id, state) in &before {
        if nodes.contains(id) {
            assert!(rank(after[id]) >= rank(*state), "{} lost confidence", id);
        }
    }

    // An import makes the other one reachable
    write_tree(
        dir.path(),
        &[(
            "main.py",
            "from util import used\nimport plugins.export\n\nused()\nPLUGIN = \"report\"\n",
        )],
    );
    let (nodes, last) = states(dir.path());
    assert_eq!(last[&export], Reachability::Reachable);
    for (id, state) in &after {
        if nodes.contains(id) {
            assert!(rank(last[id]) >= rank(*state), "{} lost confidence", id);
        }
    }
}

#[test]
fn prop_mentions_from_dead_code_still_raise_confidence() {
    let dir = tree(&[
        ("main.py", "print(1)\n"),
        ("dead.py", "def loader():\n    return 1\n"),
        ("plugins/csv_export.py", "def run(rows):\n    return rows\n"),
    ]);
    let plugin = NodeId::file("plugins/csv_export.py");
    let (_, before) = states(dir.path());
    assert_eq!(before[&plugin], Reachability::UnreachableCertain);

    write_tree(
        dir.path(),
        &[("dead.py", "def loader():\n    return \"csv_export\"\n")],
    );
    let (nodes, after) = states(dir.path());
    assert_eq!(after[&NodeId::file("dead.py")], Reachability::UnreachableCertain);
    assert_eq!(after[&plugin], Reachability::UnreachableHeuristic);
    for (id, state) in &before {
        if nodes.contains(id) {
            assert!(rank(after[id]) >= rank(*state), "{} lost confidence", id);
        }
    }

    // The plan never removes what only a dead mention points at
    let report = dry_report(dir.path());
    assert!(report
        .actions
        .iter()
        .all(|a| !(a.kind.removes_subject() && a.subject.owning_file() == plugin)));
}
