mod support;

use std::fs;

use relpack_core::deps::{install, DEPENDENCY_DIR};
use relpack_core::error::PackError;
use relpack_core::minify::{minify, minify_all, MinifyTools};
use relpack_core::tool::ToolKind;
use support::{write, FakeRunner};

fn npm_install() -> Vec<String> {
    vec!["npm".to_string(), "install".to_string()]
}

#[test]
fn minify_directory_dispatches_by_extension_depth_first() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    write(&root.join("web/b.js"), b"");
    write(&root.join("web/a/style.css"), b"");
    write(&root.join("web/a/index.html"), b"");

    let runner = FakeRunner::new();
    let report = minify(&root.join("web"), &MinifyTools::default(), &runner).expect("minify");

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].kind, ToolKind::StyleMinifier);
    assert_eq!(calls[1].kind, ToolKind::ScriptMinifier);
    assert!(calls[1].args.iter().any(|a| a.ends_with("b.js")));
    assert_eq!(report.minified.len(), 2);
    assert_eq!(report.unsupported, vec![root.join("web/a/index.html")]);
}

#[test]
fn unsupported_file_is_reported_not_fatal() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write(&tmp.path().join("logo.png"), b"png");

    let runner = FakeRunner::new();
    let report = minify(&tmp.path().join("logo.png"), &MinifyTools::default(), &runner)
        .expect("minify");

    assert!(runner.calls().is_empty());
    assert_eq!(report.unsupported.len(), 1);
}

#[test]
fn minifier_failure_and_missing_path_are_errors() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write(&tmp.path().join("js/app.js"), b"");

    let runner = FakeRunner {
        fail_kinds: vec![ToolKind::ScriptMinifier],
        ..FakeRunner::new()
    };
    let err = minify_all(tmp.path(), &["js/".to_string()], &MinifyTools::default(), &runner)
        .unwrap_err();
    assert!(matches!(err, PackError::Tool { .. }));

    let err = minify_all(
        tmp.path(),
        &["missing.js".to_string()],
        &MinifyTools::default(),
        &FakeRunner::new(),
    )
    .unwrap_err();
    assert!(matches!(err, PackError::Io { .. }));
}

#[test]
fn install_seeds_missing_cache_then_restores_from_it() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cache = tmp.path().join("cache");
    let first = tmp.path().join("first");
    fs::create_dir_all(&first).unwrap();

    let runner = FakeRunner::new();
    let report = install(&first, Some(cache.as_path()), &npm_install(), &runner).expect("install");
    assert_eq!(report.restored, 0);
    assert_eq!(report.seeded, 1);
    assert!(cache.join("left-pad/index.js").is_file());

    let calls = runner.calls_of(ToolKind::Installer);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].cwd.as_deref(), Some(first.as_path()));

    // second run: cache exists, so it is restored and not re-seeded
    write(&cache.join("cached-only/index.js"), b"cached");
    let second = tmp.path().join("second");
    write(&second.join(DEPENDENCY_DIR).join("left-pad/index.js"), b"staged");

    let report = install(&second, Some(cache.as_path()), &npm_install(), &runner).expect("install");
    assert_eq!(report.seeded, 0);
    assert_eq!(report.restored, 1, "existing staged files are not clobbered");
    assert_eq!(
        fs::read(second.join("node_modules/cached-only/index.js")).unwrap(),
        b"cached"
    );
}

#[test]
fn install_failure_is_fatal_without_cache() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner {
        fail_kinds: vec![ToolKind::Installer],
        ..FakeRunner::new()
    };

    let err = install(tmp.path(), None, &npm_install(), &runner).unwrap_err();
    assert!(matches!(err, PackError::Tool { .. }));
}

#[test]
fn install_without_cache_touches_no_cache() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let report = install(tmp.path(), None, &npm_install(), &FakeRunner::new()).expect("install");

    assert_eq!(report, Default::default());
    assert!(tmp.path().join("node_modules/left-pad/index.js").is_file());
}
