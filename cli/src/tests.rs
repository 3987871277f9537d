use super::*;
use clap::CommandFactory;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use relpack_core::error::PackError;
use relpack_core::packager::{PackagingSummary, PlatformReport};
use relpack_core::tool::{ToolInvocation, ToolKind};
use tempfile::tempdir;

/// Succeeds for every tool and leaves a bundle directory for the packager.
struct BundlingRunner;

impl ToolRunner for BundlingRunner {
    fn run(&self, inv: &ToolInvocation) -> relpack_core::error::Result<()> {
        if inv.kind == ToolKind::Packager {
            let out = PathBuf::from(inv.flag_value("--out").expect("out"));
            let platform = inv.flag_value("--platform").expect("platform");
            let arch = inv.flag_value("--arch").expect("arch");
            fs::create_dir_all(out.join(format!("{}-{platform}-{arch}", inv.args[1])))
                .expect("bundle dir");
        }
        Ok(())
    }
}

fn app_fixture(root: &Path) {
    let src = root.join("app");
    fs::create_dir_all(&src).expect("mkdir");
    fs::write(
        src.join("package.json"),
        r#"{"name":"recipe-manager","version":"1.0.3"}"#,
    )
    .expect("package.json");
    fs::write(src.join("main.js"), "").expect("main.js");
}

#[test]
fn positional_source_and_platforms() {
    let cli = Cli::try_parse_from(["relpack", "../Recipe Manager", "win32", "darwin"])
        .expect("parse cli");

    assert_eq!(cli.source, Some(PathBuf::from("../Recipe Manager")));
    let options = build_options(&cli);
    assert_eq!(
        options.platforms,
        Some(vec![Platform::Win32, Platform::Darwin])
    );
    assert!(options.minify);
    assert!(options.bump_version);
    assert_eq!(options.cache, CacheChoice::FromConfig);
}

#[test]
fn zero_arguments_use_default_source_and_config_platforms() {
    let cli = Cli::try_parse_from(["relpack"]).expect("parse cli");
    let options = build_options(&cli);

    assert_eq!(options.source, PathBuf::from(DEFAULT_SOURCE_DIR));
    assert_eq!(options.platforms, None);
}

#[test]
fn unrecognized_platform_tokens_are_dropped() {
    assert_eq!(
        select_platforms(&["amiga".into(), "linux".into(), "linux".into()]),
        Some(vec![Platform::Linux])
    );
    assert_eq!(select_platforms(&["amiga".into()]), Some(vec![]));
    assert_eq!(select_platforms(&[]), None);
}

#[test]
fn flags_map_onto_run_options() {
    let cli = Cli::try_parse_from([
        "relpack",
        "app",
        "--no-cache",
        "--no-minify",
        "--no-bump",
        "--keep-staging",
        "--follow-symlinks",
        "-j",
        "2",
        "--out",
        "dist",
        "--staging",
        "tmp/stage",
    ])
    .expect("parse cli");
    let options = build_options(&cli);

    assert_eq!(options.cache, CacheChoice::Disabled);
    assert!(!options.minify);
    assert!(!options.bump_version);
    assert!(options.keep_staging);
    assert!(options.follow_symlinks);
    assert_eq!(options.jobs, Some(2));
    assert_eq!(options.out, Some(PathBuf::from("dist")));
    assert_eq!(options.staging, Some(PathBuf::from("tmp/stage")));
}

#[test]
fn cache_and_no_cache_conflict() {
    let parse = Cli::try_parse_from(["relpack", "--cache", "c", "--no-cache"]);
    assert!(parse.is_err());
}

#[test]
fn verbosity_and_log_format_parse() {
    let cli = Cli::try_parse_from(["relpack", "-vv", "--log-format", "json"]).expect("parse");
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.log_format, LogFormat::Json);
}

#[test]
fn log_filter_prefers_relpack_log_then_rust_log() {
    assert_eq!(
        log_directives(0, Some("relpack_core=trace".into()), Some("warn".into())),
        "relpack_core=trace"
    );
    assert_eq!(log_directives(0, None, Some("warn".into())), "warn");
    assert_eq!(log_directives(0, Some(" ".into()), Some("error".into())), "error");
    assert_eq!(log_directives(1, None, None), "debug");
    assert_eq!(log_directives(3, None, Some(String::new())), "trace");
}

#[test]
fn help_lists_pipeline_flags() {
    let help = Cli::command().render_long_help().to_string();
    assert!(help.contains("--no-minify"));
    assert!(help.contains("--keep-staging"));
    assert!(help.contains("--jobs <JOBS>"));
}

#[test]
fn summary_lists_outputs_failures_and_version() {
    let report = RunReport {
        version: "1.0.4".into(),
        packaging: PackagingSummary {
            reports: vec![
                PlatformReport {
                    platform: Platform::Win32,
                    outcome: Ok(vec![PathBuf::from("releases/App-win32-x64")]),
                },
                PlatformReport {
                    platform: Platform::Darwin,
                    outcome: Err(PackError::tool("packager", "no output produced for darwin")),
                },
            ],
        },
        ..RunReport::default()
    };

    let mut buf = Cursor::new(Vec::new());
    write_summary(&report, &mut buf).expect("write");
    let output = String::from_utf8(buf.into_inner()).expect("utf8");

    assert!(output.contains("packaged win32"));
    assert!(output.contains("releases/App-win32-x64"));
    assert!(output.contains("failed   darwin"));
    assert!(output.contains("version  1.0.4"));
    assert!(!output.contains("saved to package.json"));
}

#[test]
fn execute_runs_pipeline_and_persists_version() {
    let tmp = tempdir().expect("tempdir");
    app_fixture(tmp.path());
    let args = [
        "relpack".to_string(),
        tmp.path().join("app").display().to_string(),
        "linux".to_string(),
        "--out".to_string(),
        tmp.path().join("out").display().to_string(),
        "--staging".to_string(),
        tmp.path().join("staging").display().to_string(),
        "--no-cache".to_string(),
    ];
    let cli = Cli::try_parse_from(args).expect("parse");

    execute(&cli, &BundlingRunner).expect("execute");

    let pkg = fs::read_to_string(tmp.path().join("app/package.json")).expect("read");
    assert!(pkg.contains("\"version\": \"1.0.4\""));
    assert!(tmp.path().join("out/recipe-manager-linux-x64").is_dir());
    assert!(!tmp.path().join("staging").exists());
}

#[test]
fn execute_reports_missing_source() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("missing").display().to_string();
    let cli = Cli::try_parse_from(["relpack", missing.as_str()]).expect("parse");

    let err = execute(&cli, &BundlingRunner).unwrap_err();
    assert!(format!("{err:#}").contains("not accessible"));
}
