//! include 与源码加载测试

use orbit_api::{Context, Error, MemoryFileSystem, RunConfig, Value};
use pretty_assertions::assert_eq;
use std::fs;

fn game_files() -> MemoryFileSystem {
    MemoryFileSystem::with_files([
        ("/game/main.orb", "include \"util.orb\"\nvar doubled = twice(21)"),
        ("/game/util.orb", "func twice(n) { return n * 2 }"),
        ("/game/broken.orb", "include \"faulty.orb\"\nfail_later()"),
        ("/game/faulty.orb", "func fail_later() {\n  return 1 / 0\n}"),
        ("/game/missing.orb", "var a = 1\ninclude \"nope.orb\""),
        ("/lib/abs.orb", "var from_lib = true"),
    ])
}

#[test]
fn test_compile_file_with_include() {
    let ctx = Context::with_file_system(RunConfig::default(), game_files());
    ctx.compile_file("/game/main.orb", Some(true)).unwrap();
    ctx.run_main().unwrap();

    assert_eq!(ctx.get_var("doubled").unwrap(), Value::Int(42));
    assert!(ctx.compiled_source_included("util.orb"));
    assert!(!ctx.compiled_source_included("faulty.orb"));
    assert_eq!(
        ctx.loaded_files(),
        vec![(0, "/game/main.orb".to_string()), (1, "util.orb".to_string())]
    );
    assert_eq!(ctx.filename(1).as_deref(), Some("util.orb"));
}

#[test]
fn test_runtime_error_in_included_file() {
    let ctx = Context::with_file_system(RunConfig::default(), game_files());
    ctx.compile_file("/game/broken.orb", Some(true)).unwrap();
    let err = ctx.run_main().unwrap_err();

    assert!(matches!(err, Error::Runtime { .. }), "{err:?}");
    assert_eq!(err.file(), Some("faulty.orb"));
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.to_report().file.as_deref(), Some("faulty.orb"));
}

#[test]
fn test_missing_include_is_load_error() {
    let ctx = Context::with_file_system(RunConfig::default(), game_files());
    let err = ctx.compile_file("/game/missing.orb", Some(true)).unwrap_err();

    assert!(matches!(err, Error::Load { .. }), "{err:?}");
    assert!(err.to_string().contains("Unable to load file nope.orb"));
    // 位置指向 include 语句
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.file(), Some("/game/missing.orb"));
    assert_eq!(err.phase(), "loader");
}

#[test]
fn test_missing_root_file() {
    let ctx = Context::with_file_system(RunConfig::default(), game_files());
    let err = ctx.compile_file("/game/absent.orb", None).unwrap_err();
    assert!(matches!(err, Error::Load { line: None, .. }), "{err:?}");
    assert_eq!(ctx.run_main().unwrap_err(), Error::NoEntryPoint);
}

#[test]
fn test_source_compile_resolves_from_working_paths() {
    let ctx = Context::with_file_system(RunConfig::default(), game_files());
    // 从路径编译之后，基准目录不会影响后续的源码编译
    ctx.compile_file("/game/main.orb", None).unwrap();
    assert!(ctx.compile("include \"util.orb\"", None).is_err());

    ctx.compile("include \"/lib/abs.orb\"\nvar seen = from_lib", None).unwrap();
    ctx.run_main().unwrap();
    assert_eq!(ctx.get_var("seen").unwrap(), Value::Bool(true));
    assert!(ctx.compiled_source_included("/lib/abs.orb"));
}

#[test]
fn test_native_file_system() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("main.orb"), "include \"helper.orb\"\nvar total = helper(3)").unwrap();
    fs::write(dir.path().join("helper.orb"), "func helper(n) { return n + 1 }").unwrap();

    let ctx = Context::new();
    ctx.compile_file(dir.path().join("main.orb"), None).unwrap();
    ctx.run_main().unwrap();
    assert_eq!(ctx.get_var("total").unwrap(), Value::Int(4));
    assert!(ctx.compiled_source_included("helper.orb"));
}
