//! Package manifest parsing (package.toml)
//!
//! The manifest declares everything on a flat list and restricts entries to
//! architectures with an optional `arch = [...]` field. `into_descriptor`
//! expands the flat lists into one `ArchDescriptor` per declared architecture.

use crate::arch::Arch;
use crate::descriptor::{
    ArchDescriptor, Export, FileOptions, PackageDescriptor, PackageUse, SourceItem,
};
use crate::validator::Validator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Conventional manifest file name
pub const MANIFEST_FILE: &str = "package.toml";

/// Package manifest (package.toml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PackageManifest {
    pub package: PackageMetadata,
    #[serde(default, rename = "native-dependencies")]
    pub native_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "use")]
    pub uses: Vec<UseEntry>,
    #[serde(default, rename = "imply")]
    pub implies: Vec<UseEntry>,
    #[serde(default, rename = "export")]
    pub exports: Vec<ExportEntry>,
    #[serde(default, rename = "file")]
    pub files: Vec<FileEntry>,
}

/// `[package]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PackageMetadata {
    /// Absent for the top-level application
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<semver::Version>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, rename = "debug-only")]
    pub debug_only: bool,
    #[serde(default)]
    pub test: bool,
    /// Architectures or aliases; empty means all
    #[serde(default)]
    pub architectures: Vec<String>,
}

/// `[[use]]` / `[[imply]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UseEntry {
    pub package: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub weak: bool,
    #[serde(default)]
    pub unordered: bool,
    #[serde(default)]
    pub arch: Vec<String>,
}

/// `[[export]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExportEntry {
    pub name: String,
    #[serde(default, rename = "test-only")]
    pub test_only: bool,
    #[serde(default)]
    pub arch: Vec<String>,
}

/// `[[file]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub asset: bool,
    #[serde(default)]
    pub arch: Vec<String>,
}

impl PackageManifest {
    /// Parse manifest from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&content)?)
    }

    /// Load `package.toml` from a package directory, expand and validate it
    pub fn load_descriptor(dir: &Path) -> crate::Result<PackageDescriptor> {
        let descriptor = Self::from_file(&dir.join(MANIFEST_FILE))?.into_descriptor(dir)?;
        Validator::validate(&descriptor).map_err(crate::PackageError::Validation)?;
        Ok(descriptor)
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Expand into a descriptor rooted at `source_root`
    pub fn into_descriptor(self, source_root: impl Into<PathBuf>) -> crate::Result<PackageDescriptor> {
        let arches = self.declared_arches()?;
        let mut architectures = Vec::with_capacity(arches.len());

        for arch in arches {
            let mut desc = ArchDescriptor::new(arch.clone());

            for entry in &self.uses {
                if applies_to(&entry.arch, &arch)? {
                    desc.uses.push(entry.to_use());
                }
            }

            for entry in &self.implies {
                if applies_to(&entry.arch, &arch)? {
                    let implied = entry.to_use();
                    // Implying a package also uses it
                    if !desc.uses.iter().any(|u| u.package == implied.package) {
                        desc.uses.push(implied.clone());
                    }
                    desc.implies.push(PackageUse {
                        implied_by: self.package.name.clone(),
                        ..implied
                    });
                }
            }

            for entry in &self.exports {
                if applies_to(&entry.arch, &arch)? {
                    desc.exports.push(Export {
                        name: entry.name.clone(),
                        test_only: entry.test_only,
                    });
                }
            }

            if !self.files.is_empty() {
                let mut items = Vec::new();
                for entry in &self.files {
                    if applies_to(&entry.arch, &arch)? {
                        items.push(SourceItem {
                            rel_path: entry.path.clone(),
                            options: FileOptions {
                                is_asset: entry.asset,
                            },
                        });
                    }
                }
                desc.sources = Some(items);
            }

            architectures.push(desc);
        }

        Ok(PackageDescriptor {
            name: self.package.name,
            version: self.package.version,
            summary: self.package.summary,
            debug_only: self.package.debug_only,
            is_test: self.package.test,
            source_root: source_root.into(),
            native_dependencies: self.native_dependencies,
            architectures,
        })
    }

    /// Declared architectures with aliases expanded, in declaration order
    fn declared_arches(&self) -> crate::Result<Vec<Arch>> {
        if self.package.architectures.is_empty() {
            return Ok(Arch::all());
        }

        let mut arches: Vec<Arch> = Vec::new();
        for alias in &self.package.architectures {
            for arch in Arch::expand_alias(alias)? {
                if !arches.contains(&arch) {
                    arches.push(arch);
                }
            }
        }
        Ok(arches)
    }
}

impl UseEntry {
    fn to_use(&self) -> PackageUse {
        PackageUse {
            package: self.package.clone(),
            constraint: self.version.clone(),
            weak: self.weak,
            unordered: self.unordered,
            implied_by: None,
        }
    }
}

/// Whether an entry restricted to `restriction` applies to `arch`
fn applies_to(restriction: &[String], arch: &Arch) -> crate::Result<bool> {
    if restriction.is_empty() {
        return Ok(true);
    }
    for alias in restriction {
        if Arch::expand_alias(alias)?
            .iter()
            .any(|target| arch.matches(target.as_str()))
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BOILERPLATE: &str = r#"
[package]
name = "boilerplate-generator"
version = "1.6.0"
summary = "Generates the boilerplate html from program's manifest"

[native-dependencies]
combined-stream2 = "1.1.2"

[[use]]
package = "ecmascript"

[[use]]
package = "underscore"
arch = ["server"]

[[export]]
name = "Boilerplate"
arch = ["server"]

[[file]]
path = "generator.js"
arch = ["server"]
"#;

    #[test]
    fn test_parse_boilerplate_manifest() {
        let manifest = PackageManifest::from_str(BOILERPLATE).unwrap();
        assert_eq!(manifest.package.name.as_deref(), Some("boilerplate-generator"));
        assert_eq!(manifest.uses.len(), 2);
        assert_eq!(manifest.native_dependencies["combined-stream2"], "1.1.2");
    }

    #[test]
    fn test_expand_per_arch() {
        let desc = PackageManifest::from_str(BOILERPLATE)
            .unwrap()
            .into_descriptor("/pkgs/boilerplate")
            .unwrap();

        assert_eq!(desc.architectures.len(), 3);

        let server = desc.arch(&Arch::os()).unwrap();
        let uses: Vec<_> = server.uses.iter().map(|u| u.package.as_str()).collect();
        assert_eq!(uses, vec!["ecmascript", "underscore"]);
        assert_eq!(server.exports, vec![Export::new("Boilerplate")]);
        assert_eq!(
            server.sources.as_ref().unwrap(),
            &vec![SourceItem::new("generator.js")]
        );

        let browser = desc.arch(&Arch::web_browser()).unwrap();
        assert_eq!(browser.uses.len(), 1);
        assert!(browser.exports.is_empty());
        assert_eq!(browser.sources.as_ref().unwrap().len(), 0);
    }

    #[test]
    fn test_imply_is_also_a_use() {
        let manifest = PackageManifest::from_str(
            r#"
[package]
name = "standard-packages"
architectures = ["server"]

[[imply]]
package = "templating"
"#,
        )
        .unwrap();
        let desc = manifest.into_descriptor("/p").unwrap();
        let os = desc.arch(&Arch::os()).unwrap();
        assert_eq!(os.uses, vec![PackageUse::new("templating")]);
        assert_eq!(
            os.implies,
            vec![PackageUse::new("templating").implied_by("standard-packages")]
        );
    }

    #[test]
    fn test_app_manifest_without_files_lists_on_demand() {
        let desc = PackageManifest::from_str("[package]\narchitectures = [\"client\"]\n")
            .unwrap()
            .into_descriptor("/app")
            .unwrap();
        assert!(desc.is_app());
        assert_eq!(desc.architectures.len(), 2);
        assert!(desc.architectures.iter().all(|a| a.sources.is_none()));
    }

    #[test]
    fn test_unknown_arch_alias_is_error() {
        let result = PackageManifest::from_str("[package]\narchitectures = [\"mainframe\"]\n")
            .unwrap()
            .into_descriptor("/app");
        assert!(matches!(result, Err(crate::PackageError::Arch(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(PackageManifest::from_str("[package]\nnmae = \"typo\"\n").is_err());
    }

    #[test]
    fn test_file_entries_carry_asset_option_only() {
        let manifest = "[package]\nname = \"icons\"\narchitectures = [\"web.browser\"]\n\n[[file]]\npath = \"icons.svg\"\nasset = true\n";
        let desc = PackageManifest::from_str(manifest)
            .unwrap()
            .into_descriptor("/icons")
            .unwrap();
        let sources = desc.architectures[0].sources.as_ref().unwrap();
        assert_eq!(sources, &vec![SourceItem::asset("icons.svg")]);

        let with_bare = format!("{}bare = true\n", manifest);
        assert!(PackageManifest::from_str(&with_bare).is_err());
    }
}
