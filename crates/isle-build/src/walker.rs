//! Dependency closure walking
//!
//! Breadth-first traversal over use edges that expands implied edges and
//! visits each unibuild once.

use crate::cache::{BuiltPackage, PackageCache};
use crate::unibuild::{Unibuild, UnibuildId};
use isle_package::{Arch, PackageUse};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::debug;

/// Which edges a walk follows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkPolicy {
    /// Drop unordered edges
    pub skip_unordered: bool,
    /// Weak edges to these packages are followed; all others are dropped
    pub acceptable_weak_packages: BTreeSet<String>,
    /// Do not visit debug-only packages
    pub skip_debug_only: bool,
}

impl WalkPolicy {
    /// Policy for plugin discovery: no weak or unordered edges
    pub fn plugins() -> Self {
        Self {
            skip_unordered: true,
            ..Self::default()
        }
    }

    /// Policy for lint globals: plugin discovery minus debug-only packages
    pub fn lint() -> Self {
        Self {
            skip_debug_only: true,
            ..Self::plugins()
        }
    }

    pub fn accept_weak(mut self, package: impl Into<String>) -> Self {
        self.acceptable_weak_packages.insert(package.into());
        self
    }

    fn admits(&self, edge: &PackageUse) -> bool {
        if self.skip_unordered && edge.unordered {
            return false;
        }
        !edge.weak || self.acceptable_weak_packages.contains(&edge.package)
    }
}

/// A unibuild reached by a walk
#[derive(Debug, Clone, Copy)]
pub struct UsedUnibuild<'c> {
    pub package: &'c BuiltPackage,
    pub unibuild: &'c Unibuild,
    /// Flags of the edge it was first reached through
    pub weak: bool,
    pub unordered: bool,
    /// Package whose implies led here; `None` for a direct use
    pub implied_by: Option<&'c str>,
}

/// Every unibuild reachable from `uses` at `arch`, in visit order
///
/// Root edges are filtered by `policy`; implied edges of visited unibuilds are
/// always followed. Edges that resolve to no unibuild are skipped, since the
/// gap was already reported when the package was resolved.
pub fn walk_used_unibuilds<'c>(
    cache: &'c dyn PackageCache,
    uses: &[PackageUse],
    arch: &Arch,
    policy: &WalkPolicy,
) -> Vec<UsedUnibuild<'c>> {
    let mut queue: VecDeque<(&PackageUse, Option<&'c str>)> = uses
        .iter()
        .filter(|u| policy.admits(u))
        .map(|u| (u, None))
        .collect();
    let mut processed: HashSet<UnibuildId> = HashSet::new();
    let mut visited = Vec::new();

    while let Some((edge, implied_by)) = queue.pop_front() {
        let Some(package) = cache.get(&edge.package) else {
            debug!(package = %edge.package, implied_by = ?edge.implied_by, "package not in cache, skipping");
            continue;
        };

        if package.debug_only && policy.skip_debug_only {
            continue;
        }

        let Some(unibuild) = package.unibuild_at_arch(arch) else {
            debug!(package = %edge.package, arch = %arch, "no unibuild for arch, skipping");
            continue;
        };

        if !processed.insert(unibuild.id()) {
            continue;
        }

        visited.push(UsedUnibuild {
            package,
            unibuild,
            weak: edge.weak,
            unordered: edge.unordered,
            implied_by,
        });
        let via = Some(package.name.as_str());
        queue.extend(unibuild.implies.iter().map(|implied| (implied, via)));
    }

    visited
}
