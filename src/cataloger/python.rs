use crate::cpe::CpeFieldCandidates;
use crate::error::{Error, Result};
use crate::model::{EggWheelMetadata, Ecosystem, Language, Metadata, Package, PackageType};
use crate::source::Resolver;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;

use super::{Cataloged, Cataloger, GenericCataloger, ParserFn};

/// Finds installed Python distributions from egg and wheel metadata.
pub struct PythonCataloger {
    generic: GenericCataloger,
}

impl PythonCataloger {
    pub const NAME: &'static str = "python-cataloger";

    pub fn new() -> Result<Self> {
        let glob_parsers = vec![
            ("**/*egg-info/PKG-INFO".to_string(), parse_wheel_or_egg_metadata as ParserFn),
            ("**/*dist-info/METADATA".to_string(), parse_wheel_or_egg_metadata as ParserFn),
            // a bare `foo.egg-info` file instead of a directory
            ("**/*.egg-info".to_string(), parse_wheel_or_egg_metadata as ParserFn),
        ];
        Ok(Self {
            generic: GenericCataloger::new(Self::NAME, Vec::new(), glob_parsers)?,
        })
    }
}

#[async_trait]
impl Cataloger for PythonCataloger {
    fn name(&self) -> &str {
        self.generic.name()
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn patterns(&self) -> Vec<&str> {
        self.generic.patterns()
    }

    fn cpe_candidates(&self, package: &Package) -> Option<CpeFieldCandidates> {
        Some(CpeFieldCandidates {
            vendor: Some(vec![package.name.clone(), format!("python-{}", package.name)]),
            product: None,
            target_sw: vec!["python".to_string()],
        })
    }

    async fn catalog(&self, resolver: &dyn Resolver) -> Result<Cataloged> {
        self.generic.catalog(resolver)
    }
}

/// Parses a `PKG-INFO` or `METADATA` file: `Key: value` headers up to the
/// first blank line, with indented continuation lines.
pub fn parse_wheel_or_egg_metadata(path: &str, reader: &mut dyn Read) -> Result<Vec<Package>> {
    let fields = read_headers(path, reader)?;

    let name = fields
        .get("Name")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::parse(path, "missing Name field"))?;
    let version = fields
        .get("Version")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::parse(path, "missing Version field"))?;

    let field = |key: &str| fields.get(key).cloned().unwrap_or_default();
    let licenses = match fields.get("License").map(String::as_str) {
        None | Some("") | Some("UNKNOWN") => Vec::new(),
        Some(license) => vec![license.to_string()],
    };

    let metadata = EggWheelMetadata {
        author: field("Author"),
        author_email: field("Author-email"),
        platform: fields
            .get("Platform")
            .filter(|p| !p.is_empty() && p.as_str() != "UNKNOWN")
            .cloned(),
    };

    Ok(vec![Package::new(name.as_str(), version.as_str(), Language::Python, PackageType::Python)
        .with_licenses(licenses)
        .with_metadata(Metadata::PythonEggWheel(metadata))])
}

fn read_headers(path: &str, reader: &mut dyn Read) -> Result<HashMap<String, String>> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;

    // not always UTF-8: older tools wrote latin-1 author names
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).map_err(|e| Error::parse(path, e))?;
    let content = String::from_utf8_lossy(&raw);

    for line in content.lines() {
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            // the description body follows the headers
            break;
        }

        if line.starts_with([' ', '\t']) {
            if let Some(value) = last_key.as_ref().and_then(|k| fields.get_mut(k)) {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }

        match line.split_once(':') {
            Some((key, value)) => {
                let key = key.trim().to_string();
                // repeated keys (Classifier, Requires-Dist) keep the first value
                fields.entry(key.clone()).or_insert_with(|| value.trim().to_string());
                last_key = Some(key);
            }
            None => return Err(Error::parse(path, format!("unexpected line: {:?}", line))),
        }
    }

    Ok(fields)
}
