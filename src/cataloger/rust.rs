use crate::cpe::CpeFieldCandidates;
use crate::error::{Error, Result};
use crate::model::{CargoLockMetadata, Ecosystem, Language, Metadata, Package, PackageType};
use crate::source::Resolver;
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Read;

use super::{Cataloged, Cataloger, GenericCataloger, ParserFn};

pub struct RustCataloger {
    generic: GenericCataloger,
}

impl RustCataloger {
    pub const NAME: &'static str = "rust-cataloger";

    pub fn new() -> Result<Self> {
        let glob_parsers = vec![("**/Cargo.lock".to_string(), parse_cargo_lock as ParserFn)];
        Ok(Self {
            generic: GenericCataloger::new(Self::NAME, Vec::new(), glob_parsers)?,
        })
    }
}

#[async_trait]
impl Cataloger for RustCataloger {
    fn name(&self) -> &str {
        self.generic.name()
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    fn patterns(&self) -> Vec<&str> {
        self.generic.patterns()
    }

    fn cpe_candidates(&self, _package: &Package) -> Option<CpeFieldCandidates> {
        Some(CpeFieldCandidates {
            target_sw: vec!["rust".to_string()],
            ..Default::default()
        })
    }

    async fn catalog(&self, resolver: &dyn Resolver) -> Result<Cataloged> {
        self.generic.catalog(resolver)
    }
}

#[derive(Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<CargoLockEntry>,
}

#[derive(Deserialize)]
struct CargoLockEntry {
    name: String,
    version: String,
    source: Option<String>,
    checksum: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Parses a `Cargo.lock`, one package per `[[package]]` table.
pub fn parse_cargo_lock(path: &str, reader: &mut dyn Read) -> Result<Vec<Package>> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| Error::parse(path, e))?;

    let lock: CargoLock = toml::from_str(&content).map_err(|e| Error::parse(path, e))?;

    Ok(lock
        .package
        .into_iter()
        .map(|entry| {
            let metadata = CargoLockMetadata {
                source: entry.source,
                checksum: entry.checksum,
                dependencies: entry.dependencies,
            };
            Package::new(entry.name, entry.version, Language::Rust, PackageType::RustCrate)
                .with_metadata(Metadata::RustCargoLock(metadata))
        })
        .collect())
}
