//! End-to-end pipeline tests
//!
//! Each test writes a small multi-language tree into a temp dir and runs the
//! engine over it.

use reclaim::analysis::Reachability;
use reclaim::config::Config;
use reclaim::engine::{Engine, RunOptions};
use reclaim::graph::NodeId;
use reclaim::plan::{ActionKind, GroupStatus};
use reclaim::report::Report;
use reclaim::RunContext;
use std::path::Path;
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

fn dry_run(root: &Path, config: Config) -> Report {
    let mut ctx = RunContext::new(config);
    let outcome = Engine::new(RunOptions::new(root)).run(&mut ctx);
    assert!(outcome.error.is_none(), "run failed: {:?}", outcome.error);
    outcome.report
}

fn state_of(report: &Report, node: &NodeId) -> Option<Reachability> {
    report
        .removal_candidates
        .iter()
        .find(|c| &c.node == node)
        .map(|c| c.reachability)
}

#[test]
fn test_python_package_imports() {
    let dir = write_tree(&[
        ("app/main.py", "from .dates import format_date\n\nprint(format_date(1))\n"),
        ("app/dates.py", "def format_date(d):\n    return d\n\ndef parse_date(s):\n    return s\n"),
        ("app/legacy.py", "def old():\n    pass\n"),
    ]);
    let report = dry_run(dir.path(), Config::default());

    assert_eq!(report.files.scanned, 3);
    assert_eq!(state_of(&report, &NodeId::symbol("app/dates.py", "format_date", 1)), None);
    assert_eq!(
        state_of(&report, &NodeId::symbol("app/dates.py", "parse_date", 4)),
        Some(Reachability::UnreachableCertain)
    );
    assert_eq!(
        state_of(&report, &NodeId::file("app/legacy.py")),
        Some(Reachability::UnreachableCertain)
    );

    let subjects: Vec<_> = report.actions.iter().map(|a| (a.kind, a.subject.clone())).collect();
    assert!(subjects.contains(&(ActionKind::Remove, NodeId::symbol("app/dates.py", "parse_date", 4))));
    assert!(subjects.contains(&(ActionKind::Remove, NodeId::file("app/legacy.py"))));
    // The file removal covers its symbol
    assert!(!subjects.contains(&(ActionKind::Remove, NodeId::symbol("app/legacy.py", "old", 1))));
}

#[test]
fn test_javascript_import_chain() {
    let dir = write_tree(&[
        ("src/index.js", "import { render } from './view';\n\nrender();\n"),
        ("src/view.js", "import { escape } from './html';\n\nexport function render() {\n  return escape('<p>');\n}\n"),
        ("src/html.js", "export function escape(s) {\n  return s;\n}\n"),
        ("src/unused.js", "export function nobody() {\n  return 1;\n}\n"),
    ]);
    let report = dry_run(dir.path(), Config::default());

    assert_eq!(state_of(&report, &NodeId::file("src/html.js")), None);
    assert_eq!(state_of(&report, &NodeId::file("src/view.js")), None);
    assert_eq!(
        state_of(&report, &NodeId::file("src/unused.js")),
        Some(Reachability::UnreachableCertain)
    );
}

#[test]
fn test_library_mode_keeps_public_api() {
    let files = [
        ("src/api.rs", "pub fn exported() {}\n\nfn internal() {}\n"),
        ("src/other.rs", "fn private_helper() {}\n"),
    ];
    let dir = write_tree(&files);

    let report = dry_run(dir.path(), Config::default());
    assert_eq!(
        state_of(&report, &NodeId::symbol("src/api.rs", "exported", 1)),
        Some(Reachability::UnreachableCertain)
    );

    let mut config = Config::default();
    config.entry.library_mode = true;
    let report = dry_run(dir.path(), config);
    assert_eq!(state_of(&report, &NodeId::symbol("src/api.rs", "exported", 1)), None);
    assert_eq!(
        state_of(&report, &NodeId::symbol("src/api.rs", "internal", 3)),
        Some(Reachability::UnreachableCertain)
    );
}

#[test]
fn test_annotated_tests_are_roots() {
    let dir = write_tree(&[(
        "src/lib.rs",
        "pub fn api() {}\n\nfn helper() -> u32 {\n    7\n}\n\n#[test]\nfn checks_helper() {\n    assert_eq!(helper(), 7);\n}\n",
    )]);
    let report = dry_run(dir.path(), Config::default());
    assert_eq!(state_of(&report, &NodeId::symbol("src/lib.rs", "helper", 3)), None);
    assert_eq!(state_of(&report, &NodeId::symbol("src/lib.rs", "checks_helper", 8)), None);
}

fn jvm_tree() -> TempDir {
    write_tree(&[
        (
            "app/CalcTest.java",
            "package app;\n\nclass CalcTest {\n    @Test\n    void adds() {\n        Calc.add(1, 2);\n    }\n\n    @Test public void subtracts() {\n        Calc.sub(3, 1);\n    }\n}\n",
        ),
        (
            "app/Calc.java",
            "package app;\n\npublic class Calc {\n    public static int add(int a, int b) {\n        return a + b;\n    }\n\n    public static int sub(int a, int b) {\n        return a - b;\n    }\n}\n",
        ),
        (
            "app/Legacy.java",
            "package app;\n\nclass Legacy {\n    static int old(int a) {\n        return a;\n    }\n}\n",
        ),
        ("app/CalcSpec.kt", "package app\n\nclass CalcSpec {\n    @Test\n    fun doubles() {\n        twice(2)\n    }\n}\n"),
        ("app/Numbers.kt", "package app\n\nfun twice(x: Int): Int {\n    return x * 2\n}\n"),
    ])
}

#[test]
fn test_jvm_test_annotations_are_roots() {
    let dir = jvm_tree();
    let report = dry_run(dir.path(), Config::default());

    assert_eq!(state_of(&report, &NodeId::symbol("app/CalcTest.java", "adds", 5)), None);
    assert_eq!(state_of(&report, &NodeId::symbol("app/CalcTest.java", "subtracts", 9)), None);
    assert_eq!(state_of(&report, &NodeId::file("app/Calc.java")), None);
    assert_eq!(state_of(&report, &NodeId::symbol("app/Numbers.kt", "twice", 3)), None);

    let removed: Vec<_> = report
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::Remove)
        .map(|a| a.subject.clone())
        .collect();
    assert_eq!(removed, vec![NodeId::file("app/Legacy.java")]);
}

#[test]
fn test_jvm_tests_without_entry_annotations_are_dead() {
    let dir = jvm_tree();
    let mut config = Config::default();
    config.entry.annotations.clear();
    let report = dry_run(dir.path(), config);

    let removed: Vec<_> = report
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::Remove)
        .map(|a| a.subject.clone())
        .collect();
    assert!(removed.contains(&NodeId::file("app/CalcTest.java")));
    assert!(removed.contains(&NodeId::file("app/CalcSpec.kt")));
}

#[test]
fn test_unprofiled_files_are_opaque_roots() {
    let dir = write_tree(&[
        ("main.py", "print(1)\n"),
        ("native/shim.c", "int shim(void) { return 0; }\n"),
    ]);
    let report = dry_run(dir.path(), Config::default());
    assert_eq!(report.files.scanned, 2);
    assert_eq!(report.files.opaque, 1);
    assert!(report.actions.is_empty());
}

#[test]
fn test_language_filter() {
    let dir = write_tree(&[
        ("main.py", "print(1)\n"),
        ("old.py", "x = 1\n"),
        ("web/old.js", "var x = 1;\n"),
    ]);
    let mut config = Config::default();
    config.scan.languages = vec![reclaim::Language::Python];
    let report = dry_run(dir.path(), config);
    assert_eq!(report.files.scanned, 2);
    assert!(report.actions.iter().all(|a| a.subject.path().extension().unwrap() == "py"));
}

#[test]
fn test_excluded_paths_are_not_scanned() {
    let dir = write_tree(&[
        ("main.py", "print(1)\n"),
        ("generated/models.py", "class Model:\n    pass\n"),
    ]);
    let mut config = Config::default();
    config.scan.exclude.push("generated/**".to_string());
    let report = dry_run(dir.path(), config);
    assert_eq!(report.files.scanned, 1);
    assert!(report.actions.is_empty());
}

#[test]
fn test_unique_entry_point_violation_is_fatal() {
    let dir = write_tree(&[
        ("a.py", "def bootstrap():\n    pass\n"),
        ("b.py", "def bootstrap():\n    pass\n"),
    ]);
    let mut config = Config::default();
    config.entry.unique_entry_points = vec!["bootstrap".to_string()];
    let mut ctx = RunContext::new(config);
    let outcome = Engine::new(RunOptions::new(dir.path())).run(&mut ctx);

    assert!(outcome.error.is_some());
    assert!(!outcome.report.run.complete);
    assert!(outcome.report.run.error.as_deref().unwrap().contains("bootstrap"));
    assert_eq!(outcome.report.files.scanned, 2);
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn test_extraction_cache_survives_between_runs() {
    let dir = write_tree(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")]);
    let engine = Engine::new(RunOptions::new(dir.path()));
    let mut ctx = RunContext::new(Config::default());

    engine.run(&mut ctx);
    assert_eq!(ctx.cache.stats().misses, 2);

    std::fs::write(dir.path().join("old.py"), "x = 2\n").unwrap();
    engine.run(&mut ctx);
    let stats = ctx.cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.total_files, 2);
}

#[test]
fn test_archive_mode_moves_dead_files() {
    let dir = write_tree(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")]);
    let mut config = Config::default();
    config.plan.archive_dead_files = true;
    config.run.verify_command = Some(if cfg!(windows) { "exit 0" } else { "true" }.to_string());
    let mut ctx = RunContext::new(config);
    let outcome = Engine::new(RunOptions::new(dir.path()).apply()).run(&mut ctx);

    assert!(outcome.error.is_none());
    assert_eq!(outcome.report.actions[0].kind, ActionKind::Archive);
    assert_eq!(outcome.report.groups[0].status, GroupStatus::Committed);
    assert!(!dir.path().join("old.py").exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".reclaim-archive/old.py")).unwrap(),
        "x = 1\n"
    );

    // The archive directory is hidden from later scans
    let report = dry_run(dir.path(), Config::default());
    assert_eq!(report.files.scanned, 1);
    assert!(report.actions.is_empty());
}

#[test]
fn test_report_written_and_reloaded() {
    let dir = write_tree(&[("main.py", "print(1)\n"), ("old.py", "x = 1\n")]);
    let report = dry_run(dir.path(), Config::default());
    let out = TempDir::new().unwrap();

    let json = out.path().join("plan.json");
    report.save(&json).unwrap();
    assert_eq!(Report::load(&json).unwrap(), report);

    let yaml = out.path().join("plan.yaml");
    report.save(&yaml).unwrap();
    assert_eq!(Report::load(&yaml).unwrap().fingerprint, report.fingerprint);
}
