use crate::cpe::Cpe;
use crate::source::Location;
use serde::{Deserialize, Serialize};

use super::{Language, PackageType};

/// Author details from an egg or wheel `PKG-INFO`/`METADATA` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EggWheelMetadata {
    pub author: String,
    pub author_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// One `[[package]]` entry of a `Cargo.lock`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoLockMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpmPackageJsonMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ecosystem-specific details, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Metadata {
    PythonEggWheel(EggWheelMetadata),
    RustCargoLock(CargoLockMetadata),
    NpmPackageJson(NpmPackageJsonMetadata),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,
    pub version: String,
    pub language: Language,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub licenses: Vec<String>,
    /// Name of the cataloger that produced this package.
    pub found_by: String,
    pub locations: Vec<Location>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cpes: Vec<Cpe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        language: Language,
        package_type: PackageType,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            language,
            package_type,
            licenses: Vec::new(),
            found_by: String::new(),
            locations: Vec::new(),
            cpes: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.licenses.push(license.into());
        self
    }

    pub fn with_licenses(mut self, licenses: Vec<String>) -> Self {
        self.licenses = licenses;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    pub fn with_found_by(mut self, found_by: impl Into<String>) -> Self {
        self.found_by = found_by.into();
        self
    }

    pub fn with_cpes(mut self, cpes: Vec<Cpe>) -> Self {
        self.cpes = cpes;
        self
    }

    /// Where the package was first seen, for display.
    pub fn primary_location(&self) -> Option<&Location> {
        self.locations.first()
    }
}
