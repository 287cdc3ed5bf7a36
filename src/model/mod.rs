//! Core data types for discovered packages.
//!
//! - [`Package`] - A package found in a source, with provenance
//! - [`Language`] / [`PackageType`] - What a package is
//! - [`Ecosystem`] - The tag catalogers are registered under
//! - [`CatalogResult`] - Everything one run found, ready for output
//!
//! # Example
//!
//! ```
//! use layerscan::{Language, Package, PackageType};
//!
//! let package = Package::new("requests", "2.22.0", Language::Python, PackageType::Python)
//!     .with_license("Apache 2.0");
//!
//! assert_eq!(package.licenses, vec!["Apache 2.0"]);
//! ```

mod package;

pub use package::*;
use crate::indexer::FileDigest;
use crate::source::Scope;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Rust,
    JavaScript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    Python,
    RustCrate,
    Npm,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Python => "python",
            PackageType::RustCrate => "rust-crate",
            PackageType::Npm => "npm",
        }
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The package ecosystem a cataloger covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Python,
    Rust,
    JavaScript,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 3] = [Ecosystem::Python, Ecosystem::Rust, Ecosystem::JavaScript];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Python => "python",
            Ecosystem::Rust => "rust",
            Ecosystem::JavaScript => "javascript",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ecosystem::Python => "Python",
            Ecosystem::Rust => "Rust",
            Ecosystem::JavaScript => "JavaScript",
        }
    }
}

impl FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" => Ok(Ecosystem::Python),
            "rust" => Ok(Ecosystem::Rust),
            "javascript" | "js" | "npm" => Ok(Ecosystem::JavaScript),
            _ => Err(format!("unknown ecosystem: {}", s)),
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// What was cataloged.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub specifier: String,
    /// `image` or `directory`.
    pub kind: &'static str,
    /// Only meaningful for images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

/// Complete results of one run.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogResult {
    pub source: SourceInfo,
    pub packages: Vec<Package>,
    /// Failures that did not stop the run, one line each.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub digests: Vec<FileDigest>,
}

impl CatalogResult {
    pub fn new(source: SourceInfo, packages: Vec<Package>) -> Self {
        Self {
            source,
            packages,
            errors: Vec::new(),
            digests: Vec::new(),
        }
    }
}
