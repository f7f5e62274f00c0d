//! Manifest loading tests against on-disk package directories

use isle_package::{Arch, PackageError, PackageManifest, PackageUse, MANIFEST_FILE};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn write_manifest(content: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(MANIFEST_FILE), content).unwrap();
    dir
}

#[test]
fn test_load_descriptor_from_directory() {
    let dir = write_manifest(
        r#"
[package]
name = "less"
version = "2.7.9"
architectures = ["server", "web.browser"]

[[use]]
package = "caching-compiler"
version = "1.0.0"

[[use]]
package = "ecmascript"
weak = true
arch = ["client"]
"#,
    );

    let desc = PackageManifest::load_descriptor(dir.path()).unwrap();
    assert_eq!(desc.name.as_deref(), Some("less"));
    assert_eq!(desc.version, Some(semver::Version::new(2, 7, 9)));
    assert_eq!(desc.source_root, dir.path());
    assert_eq!(
        desc.architectures
            .iter()
            .map(|a| a.arch.as_str())
            .collect::<Vec<_>>(),
        vec!["os", "web.browser"]
    );

    let os = desc.arch(&Arch::os()).unwrap();
    assert_eq!(
        os.uses,
        vec![PackageUse::new("caching-compiler").with_constraint("1.0.0")]
    );

    let browser = desc.arch(&Arch::web_browser()).unwrap();
    assert_eq!(browser.uses.len(), 2);
    assert!(browser.uses[1].weak);
}

#[test]
fn test_load_descriptor_missing_manifest() {
    let dir = TempDir::new().unwrap();
    let result = PackageManifest::load_descriptor(dir.path());
    assert!(matches!(result, Err(PackageError::IoError(_))));
}

#[test]
fn test_load_descriptor_reports_validation_errors() {
    let dir = write_manifest(
        r#"
[package]
name = "Widgets"
architectures = ["server"]

[[export]]
name = "Widget"

[[export]]
name = "Widget"
"#,
    );

    match PackageManifest::load_descriptor(dir.path()) {
        Err(PackageError::Validation(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("Expected validation errors, got {:?}", other),
    }
}

#[test]
fn test_manifest_round_trips_through_toml() {
    let manifest = PackageManifest::from_str(
        r#"
[package]
name = "templating"
debug-only = true

[[file]]
path = "templates.html"
arch = ["client"]
"#,
    )
    .unwrap();

    let reparsed = PackageManifest::from_str(&manifest.to_string().unwrap()).unwrap();
    assert_eq!(reparsed, manifest);
    assert!(reparsed.package.debug_only);
}
