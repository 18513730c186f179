//! Manifest integration tests for Berth.
//!
//! These tests load Berth.toml files from disk and compose them.

use std::fs;

use berth::builder::plan::Composer;
use berth::builder::toolchain::{EnvSignals, ToolchainFamily};
use berth::core::manifest::{Manifest, MANIFEST_NAME};
use berth::core::settings::Role;
use tempfile::TempDir;

const SAKURA: &str = r#"
[toolchain]
default = "gcc"

[[toolchain.signal]]
any = ["VisualStudioVersion", "VSINSTALLDIR"]
use = "visualcpp"

[gembox.default]
core = ["mruby-print", "mruby-math", "mruby-struct"]

[[target]]
name = "host"
debug = true
gembox = ["default"]

[[target]]
name = "RX630"
kind = "cross"
toolchain = "gcc"
prefix = "/usr/share/gnurx_v14.03_elf-1/bin/rx-elf-"
bins = []
test-lib-only = true
cxx-exceptions = false

[target.role.cc]
flags = "-Wall -g -Os -flto -mcpu=rx600 -m64bit-doubles -DGRSAKURA -DARDUINO=100"
include-paths = ["../gr_common/lib/", "../gr_common", "../gr_common/core"]

[target.role.cxx]
derive = "cc"

[target.role.linker]
command = "/usr/share/gnurx_v14.03_elf-1/bin/rx-elf-ld"

[target.role.archiver]
template = "rcs %{outfile} %{objs}"

[[target.gem]]
core = "mruby-compiler"

[[target.gem]]
core = "mruby-math"

[[target.gem]]
github = "takjn/mruby-arduino"
branch = "master"

[[target.gem]]
github = "takjn/mruby-arduino-neopixel"
branch = "master"
included = false
"#;

fn write_manifest(content: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(MANIFEST_NAME), content).unwrap();
    tmp
}

#[test]
fn test_load_and_compose() {
    let tmp = write_manifest(SAKURA);
    let manifest = Manifest::load(&tmp.path().join(MANIFEST_NAME)).unwrap();
    let (registry, resolver) = manifest.into_parts();

    let outcome = Composer::new(resolver).compose(&registry, &EnvSignals::new());
    let records = outcome.into_result().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].target(), "host");
    assert_eq!(records[1].target(), "RX630");

    let host = &records[0];
    assert_eq!(host.toolchain().family(), ToolchainFamily::Gcc);
    assert_eq!(host.dependencies().len(), 3);

    let rx = &records[1];
    assert_eq!(
        rx.settings(Role::CompileCxx).unwrap().command(),
        Some("/usr/share/gnurx_v14.03_elf-1/bin/rx-elf-g++")
    );
    assert_eq!(
        rx.settings(Role::Link).unwrap().command(),
        Some("/usr/share/gnurx_v14.03_elf-1/bin/rx-elf-ld")
    );
    assert_eq!(
        rx.settings(Role::CompileCxx).unwrap().flags(),
        rx.settings(Role::CompileC).unwrap().flags()
    );

    let names: Vec<_> = rx.dependencies().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["mruby-compiler", "mruby-math", "mruby-arduino"]);
    assert_eq!(rx.fetch_requests().len(), 1);
}

#[test]
fn test_manifest_signals_select_msvc() {
    let tmp = write_manifest(SAKURA);
    let manifest = Manifest::load(&tmp.path().join(MANIFEST_NAME)).unwrap();

    let env = EnvSignals::new().set("VisualStudioVersion", "16.0");
    let outcome = Composer::new(manifest.resolver().clone()).compose(manifest.registry(), &env);
    let host = outcome.record("host").unwrap();
    assert_eq!(host.toolchain().name(), "msvc");

    // Pinned toolchains ignore the signal
    let rx = outcome.record("RX630").unwrap();
    assert_eq!(rx.toolchain().family(), ToolchainFamily::Gcc);
}

#[test]
fn test_load_missing_file() {
    let tmp = TempDir::new().unwrap();
    let err = Manifest::load(&tmp.path().join(MANIFEST_NAME)).unwrap_err();
    assert!(err.to_string().contains("failed to read manifest"));
}

#[test]
fn test_load_reports_invalid_manifest() {
    let tmp = write_manifest("[[target]]\nname = \"host\"\ntoolchain = \"tcc\"\n");
    let err = Manifest::load(&tmp.path().join(MANIFEST_NAME)).unwrap_err();
    assert!(err.to_string().contains("invalid manifest"));
    assert!(format!("{:#}", err).contains("unknown toolchain `tcc`"));
}

#[test]
fn test_bad_template_fails_at_composition() {
    let tmp = write_manifest(
        r#"
[[target]]
name = "host"

[target.role.archiver]
template = "rcs %{outfile} %{infile}"
"#,
    );
    let manifest = Manifest::load(&tmp.path().join(MANIFEST_NAME)).unwrap();
    let outcome = Composer::new(manifest.resolver().clone()).compose(manifest.registry(), &EnvSignals::new());

    let errors = outcome.errors();
    assert_eq!(errors.len(), 1);
    let rendered = errors[0].to_diagnostic().to_string();
    assert!(rendered.contains("unresolved placeholder `%{infile}`"));
}
