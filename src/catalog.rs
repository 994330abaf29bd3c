//! Package catalog: package sets, job roles and the package glossary.
//!
//! The catalog is a read-only JSON document consumed at startup:
//!
//! ```json
//! {
//!   "package_sets": {
//!     "jupyter": { "name": "Jupyter", "category": "core",
//!                  "packages": ["jupyterlab", "notebook", "ipykernel"] }
//!   },
//!   "job_roles": {
//!     "data_scientist": { "name": "Data Scientist", "description": "...",
//!                         "sets": ["jupyter", "data_science"],
//!                         "install_time": "5-10 min", "disk_size": "1.2 GB" }
//!   }
//! }
//! ```
//!
//! An optional glossary document maps package names to `{ "description": ... }`.
//!
//! # Degraded mode
//!
//! A missing or malformed catalog never stops the program. [`Catalog::load`]
//! falls back to a small built-in catalog (a notebook bundle and a few
//! companions) so environment creation stays usable. Callers query both
//! variants through the same methods and never branch on which is active.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// A named, curated group of packages installed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSet {
    /// Catalog key. Filled in from the map key when loading.
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// Package names in catalog-declared order, unique within the set.
    pub packages: Vec<String>,
}

/// A named bundle of package sets for a profession or use-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRole {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Set identifiers. Order is the install order.
    pub sets: Vec<String>,
    #[serde(default)]
    pub install_time: String,
    #[serde(default)]
    pub disk_size: String,
}

/// Parsed catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub package_sets: BTreeMap<String, PackageSet>,
    #[serde(default)]
    pub job_roles: BTreeMap<String, JobRole>,
}

impl CatalogData {
    /// Parse a catalog document and normalize it (ids from keys, duplicate
    /// packages within a set dropped keeping the first occurrence).
    pub fn from_json(content: &str) -> Result<Self> {
        let mut data: Self = serde_json::from_str(content).context("Failed to parse catalog JSON")?;
        if data.package_sets.is_empty() {
            anyhow::bail!("Catalog defines no package sets");
        }
        data.normalize();
        Ok(data)
    }

    fn normalize(&mut self) {
        for (id, set) in self.package_sets.iter_mut() {
            set.id = id.clone();
            let mut seen = HashSet::new();
            set.packages.retain(|pkg| seen.insert(pkg.clone()));
        }
        for (id, role) in self.job_roles.iter_mut() {
            role.id = id.clone();
        }
        for role in self.job_roles.values() {
            for set_id in &role.sets {
                if !self.package_sets.contains_key(set_id) {
                    warn!("Job role '{}' references unknown package set '{}'", role.id, set_id);
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GlossaryEntry {
    description: String,
}

/// Where the catalog data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// Parsed from the catalog document
    Loaded(CatalogData),
    /// Built-in minimal data used when the document is missing or malformed
    Fallback(CatalogData),
}

/// Read-only query interface over the catalog and glossary.
#[derive(Debug, Clone)]
pub struct Catalog {
    source: CatalogSource,
    glossary: HashMap<String, String>,
}

impl Catalog {
    /// Build a catalog from already-parsed data.
    pub fn from_data(mut data: CatalogData, glossary: HashMap<String, String>) -> Self {
        data.normalize();
        Self {
            source: CatalogSource::Loaded(data),
            glossary,
        }
    }

    /// The built-in catalog.
    pub fn fallback() -> Self {
        Self {
            source: CatalogSource::Fallback(builtin_data()),
            glossary: builtin_glossary(),
        }
    }

    /// Load the catalog and optional glossary from disk.
    ///
    /// Never fails: a missing or malformed catalog degrades to
    /// [`Catalog::fallback`] with a warning; a missing or malformed glossary
    /// leaves descriptions empty.
    pub fn load(catalog_path: &Path, glossary_path: Option<&Path>) -> Self {
        let mut catalog = match read_catalog(catalog_path) {
            Ok(data) => {
                debug!(
                    "Loaded catalog {}: {} sets, {} roles",
                    catalog_path.display(),
                    data.package_sets.len(),
                    data.job_roles.len()
                );
                Self {
                    source: CatalogSource::Loaded(data),
                    glossary: HashMap::new(),
                }
            }
            Err(e) => {
                warn!("{:#}; using built-in fallback catalog", e);
                Self::fallback()
            }
        };

        if let Some(path) = glossary_path {
            match read_glossary(path) {
                Ok(glossary) => catalog.glossary.extend(glossary),
                Err(e) => debug!("No glossary loaded: {:#}", e),
            }
        }

        catalog
    }

    /// Returns true when the built-in fallback data is active.
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, CatalogSource::Fallback(_))
    }

    fn data(&self) -> &CatalogData {
        match &self.source {
            CatalogSource::Loaded(data) | CatalogSource::Fallback(data) => data,
        }
    }

    /// Packages of a set, in catalog order. Empty when the set is unknown.
    pub fn set_packages(&self, set_id: &str) -> Vec<String> {
        self.data()
            .package_sets
            .get(set_id)
            .map(|set| set.packages.clone())
            .unwrap_or_default()
    }

    /// Ordered set identifiers of a role. Empty when the role is unknown.
    pub fn role_sets(&self, role_id: &str) -> Vec<String> {
        self.data()
            .job_roles
            .get(role_id)
            .map(|role| role.sets.clone())
            .unwrap_or_default()
    }

    /// Glossary description for a package, if any.
    pub fn package_description(&self, package: &str) -> Option<&str> {
        self.glossary
            .get(package)
            .map(String::as_str)
            .filter(|desc| !desc.trim().is_empty())
    }

    /// Deduplicated union of the packages of several sets, sorted.
    /// Unknown sets contribute nothing.
    pub fn union_packages<S: AsRef<str>>(&self, set_ids: &[S]) -> Vec<String> {
        let union: BTreeSet<String> = set_ids
            .iter()
            .flat_map(|id| self.set_packages(id.as_ref()))
            .collect();
        union.into_iter().collect()
    }

    pub fn package_set(&self, set_id: &str) -> Option<&PackageSet> {
        self.data().package_sets.get(set_id)
    }

    pub fn job_role(&self, role_id: &str) -> Option<&JobRole> {
        self.data().job_roles.get(role_id)
    }

    /// All sets, sorted by identifier.
    pub fn package_sets(&self) -> impl Iterator<Item = &PackageSet> {
        self.data().package_sets.values()
    }

    /// All roles, sorted by identifier.
    pub fn job_roles(&self) -> impl Iterator<Item = &JobRole> {
        self.data().job_roles.values()
    }
}

fn read_catalog(path: &Path) -> Result<CatalogData> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    CatalogData::from_json(&content)
        .with_context(|| format!("Malformed catalog {}", path.display()))
}

fn read_glossary(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read glossary {}", path.display()))?;
    let entries: HashMap<String, GlossaryEntry> =
        serde_json::from_str(&content).context("Failed to parse glossary JSON")?;
    Ok(entries
        .into_iter()
        .map(|(name, entry)| (name, entry.description))
        .collect())
}

// ============================================================================
// Built-in fallback data
// ============================================================================

/// Built-in sets: (id, display name, category, packages)
const BUILTIN_SETS: &[(&str, &str, &str, &[&str])] = &[
    (
        "jupyter",
        "Jupyter Notebook",
        "core",
        &["jupyterlab", "notebook", "ipykernel"],
    ),
    (
        "data_science",
        "Data Science Essentials",
        "data",
        &["numpy", "pandas", "matplotlib", "scipy", "seaborn"],
    ),
    (
        "dev_tools",
        "Developer Tools",
        "tooling",
        &["ipython", "black", "ruff", "pytest"],
    ),
];

/// Built-in glossary: (package, description)
const BUILTIN_GLOSSARY: &[(&str, &str)] = &[
    ("jupyterlab", "Next-generation web-based notebook interface"),
    ("notebook", "Classic Jupyter notebook server"),
    ("ipykernel", "IPython kernel for Jupyter"),
    ("numpy", "N-dimensional arrays and numerical computing"),
    ("pandas", "Labeled tabular data structures and analysis"),
    ("matplotlib", "2D plotting library"),
    ("scipy", "Scientific algorithms: optimization, stats, signal"),
    ("seaborn", "Statistical data visualization on top of matplotlib"),
    ("ipython", "Enhanced interactive Python shell"),
    ("black", "Uncompromising code formatter"),
    ("ruff", "Fast Python linter and formatter"),
    ("pytest", "Testing framework"),
];

fn builtin_data() -> CatalogData {
    let package_sets = BUILTIN_SETS
        .iter()
        .map(|(id, name, category, packages)| {
            (
                id.to_string(),
                PackageSet {
                    id: id.to_string(),
                    name: name.to_string(),
                    category: category.to_string(),
                    packages: packages.iter().map(|p| p.to_string()).collect(),
                },
            )
        })
        .collect();

    let mut job_roles = BTreeMap::new();
    job_roles.insert(
        "data_scientist".to_string(),
        JobRole {
            id: "data_scientist".to_string(),
            name: "Data Scientist".to_string(),
            description: "Notebooks plus the core numerical and plotting stack".to_string(),
            sets: vec!["jupyter".to_string(), "data_science".to_string()],
            install_time: "5-10 min".to_string(),
            disk_size: "~1 GB".to_string(),
        },
    );

    CatalogData {
        package_sets,
        job_roles,
    }
}

fn builtin_glossary() -> HashMap<String, String> {
    BUILTIN_GLOSSARY
        .iter()
        .map(|(name, desc)| (name.to_string(), desc.to_string()))
        .collect()
}
