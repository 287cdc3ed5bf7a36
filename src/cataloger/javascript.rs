use crate::cpe::CpeFieldCandidates;
use crate::error::{Error, Result};
use crate::model::{Ecosystem, Language, Metadata, NpmPackageJsonMetadata, Package, PackageType};
use crate::source::Resolver;
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Read;

use super::{Cataloged, Cataloger, GenericCataloger, ParserFn};

/// Finds npm packages from `package.json` manifests, including ones under `node_modules`.
pub struct JavaScriptCataloger {
    generic: GenericCataloger,
}

impl JavaScriptCataloger {
    pub const NAME: &'static str = "javascript-cataloger";

    pub fn new() -> Result<Self> {
        let glob_parsers = vec![("**/package.json".to_string(), parse_package_json as ParserFn)];
        Ok(Self {
            generic: GenericCataloger::new(Self::NAME, Vec::new(), glob_parsers)?,
        })
    }
}

#[async_trait]
impl Cataloger for JavaScriptCataloger {
    fn name(&self) -> &str {
        self.generic.name()
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::JavaScript
    }

    fn patterns(&self) -> Vec<&str> {
        self.generic.patterns()
    }

    fn cpe_candidates(&self, _package: &Package) -> Option<CpeFieldCandidates> {
        Some(CpeFieldCandidates {
            target_sw: vec!["node.js".to_string()],
            ..Default::default()
        })
    }

    async fn catalog(&self, resolver: &dyn Resolver) -> Result<Cataloged> {
        self.generic.catalog(resolver)
    }
}

#[derive(Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    author: Option<Person>,
    homepage: Option<String>,
    description: Option<String>,
    license: Option<Licenses>,
    licenses: Option<Licenses>,
}

/// Either field may hold one license or a list, whatever the spelling suggests.
#[derive(Deserialize)]
#[serde(untagged)]
enum Licenses {
    Many(Vec<License>),
    One(License),
}

impl Licenses {
    fn into_names(self) -> Vec<String> {
        match self {
            Licenses::One(license) => license.into_name().into_iter().collect(),
            Licenses::Many(licenses) => licenses.into_iter().filter_map(License::into_name).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum License {
    Text(String),
    Object {
        #[serde(rename = "type")]
        kind: String,
    },
    // unrecognized shapes carry no usable name
    Other(serde_json::Value),
}

impl License {
    fn into_name(self) -> Option<String> {
        match self {
            License::Text(name) => Some(name),
            License::Object { kind } => Some(kind),
            License::Other(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Person {
    Text(String),
    Object {
        name: Option<String>,
        email: Option<String>,
    },
}

impl Person {
    fn display(self) -> Option<String> {
        match self {
            Person::Text(text) => Some(text),
            Person::Object { name, email } => match (name, email) {
                (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
                (Some(name), None) => Some(name),
                (None, Some(email)) => Some(email),
                (None, None) => None,
            },
        }
    }
}

/// Parses a `package.json`. Manifests without both a name and a version
/// (workspace roots, private apps) yield no package.
pub fn parse_package_json(path: &str, reader: &mut dyn Read) -> Result<Vec<Package>> {
    let manifest: PackageJson = serde_json::from_reader(reader).map_err(|e| Error::parse(path, e))?;

    let (Some(name), Some(version)) = (manifest.name, manifest.version) else {
        return Ok(Vec::new());
    };

    let licenses: Vec<String> = match (manifest.license, manifest.licenses) {
        (Some(license), _) => license.into_names(),
        (None, Some(legacy)) => legacy.into_names(),
        (None, None) => Vec::new(),
    };

    let metadata = NpmPackageJsonMetadata {
        author: manifest.author.and_then(Person::display),
        homepage: manifest.homepage,
        description: manifest.description,
    };

    Ok(vec![Package::new(name, version, Language::JavaScript, PackageType::Npm)
        .with_licenses(licenses)
        .with_metadata(Metadata::NpmPackageJson(metadata))])
}
