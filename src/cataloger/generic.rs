use crate::error::{Error, LocationFailure, Result};
use crate::model::Package;
use crate::source::{Location, Resolver};
use std::io::Read;
use tracing::{debug, info, warn};

/// Turns one manifest into packages.
///
/// Receives the path the file was found at and its content. Must not keep the
/// reader past return, and returns an empty list (not an error) when the
/// manifest names no packages.
pub type ParserFn = fn(&str, &mut dyn Read) -> Result<Vec<Package>>;

/// The outcome of one catalog pass: everything that parsed, and every location that did not.
#[derive(Debug, Default)]
pub struct Cataloged {
    pub packages: Vec<Package>,
    pub failures: Vec<LocationFailure>,
}

impl Cataloged {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Splits into the packages found and, if any location failed, one aggregate error.
    pub fn into_parts(self, cataloger: &str) -> (Vec<Package>, Option<Error>) {
        let error = (!self.failures.is_empty()).then(|| Error::Catalog {
            cataloger: cataloger.to_string(),
            failures: self.failures,
        });
        (self.packages, error)
    }
}

/// Binds path and glob patterns to parser functions.
///
/// Patterns are visited globs first, then literal paths, each in the order
/// they were registered.
#[derive(Debug, Clone)]
pub struct GenericCataloger {
    name: String,
    path_parsers: Vec<(String, ParserFn)>,
    glob_parsers: Vec<(String, ParserFn)>,
}

impl GenericCataloger {
    pub fn new(
        name: impl Into<String>,
        path_parsers: Vec<(String, ParserFn)>,
        glob_parsers: Vec<(String, ParserFn)>,
    ) -> Result<Self> {
        let name = name.into();
        if path_parsers.is_empty() && glob_parsers.is_empty() {
            return Err(Error::Configuration(format!(
                "cataloger {:?} has no path or glob parsers",
                name
            )));
        }
        Ok(Self {
            name,
            path_parsers,
            glob_parsers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every bound pattern, globs first.
    pub fn patterns(&self) -> Vec<&str> {
        self.glob_parsers
            .iter()
            .chain(self.path_parsers.iter())
            .map(|(pattern, _)| pattern.as_str())
            .collect()
    }

    /// Runs every bound parser over the files the resolver finds.
    ///
    /// Resolver query errors abort the pass. Content and parse errors are
    /// collected per location while the remaining locations continue.
    pub fn catalog(&self, resolver: &dyn Resolver) -> Result<Cataloged> {
        let mut cataloged = Cataloged::default();

        for (pattern, parser) in &self.glob_parsers {
            let locations = resolver.files_by_glob(&[pattern.as_str()])?;
            debug!(cataloger = %self.name, pattern = %pattern, matches = locations.len(), "glob resolved");
            self.parse_locations(resolver, locations, *parser, &mut cataloged);
        }

        for (path, parser) in &self.path_parsers {
            let locations = resolver.files_by_path(&[path.as_str()])?;
            debug!(cataloger = %self.name, path = %path, matches = locations.len(), "path resolved");
            self.parse_locations(resolver, locations, *parser, &mut cataloged);
        }

        info!(
            cataloger = %self.name,
            packages = cataloged.packages.len(),
            failures = cataloged.failures.len(),
            "catalog pass complete"
        );
        Ok(cataloged)
    }

    fn parse_locations(
        &self,
        resolver: &dyn Resolver,
        locations: Vec<Location>,
        parser: ParserFn,
        cataloged: &mut Cataloged,
    ) {
        for location in locations {
            match self.parse_location(resolver, &location, parser) {
                Ok(packages) => cataloged.packages.extend(packages),
                Err(e) => {
                    warn!(cataloger = %self.name, path = %location, error = %e, "failed to catalog location");
                    cataloged.failures.push(LocationFailure {
                        path: location.path().to_string(),
                        error: e,
                    });
                }
            }
        }
    }

    fn parse_location(&self, resolver: &dyn Resolver, location: &Location, parser: ParserFn) -> Result<Vec<Package>> {
        let mut content = resolver.file_content_by_location(location)?;
        let packages = parser(location.path(), &mut content)?;
        Ok(packages
            .into_iter()
            .map(|p| p.with_found_by(&self.name).with_location(location.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use crate::model::{Language, PackageType};
    use crate::source::{AllLayersResolver, SquashResolver};

    fn parse_name_version(_path: &str, reader: &mut dyn Read) -> Result<Vec<Package>> {
        let mut content = String::new();
        reader.read_to_string(&mut content).map_err(|e| Error::parse("test", e))?;
        match content.trim().split_once(' ') {
            Some((name, version)) => Ok(vec![Package::new(name, version, Language::Python, PackageType::Python)]),
            None => Err(Error::parse("test", "expected `name version`")),
        }
    }

    fn image() -> std::sync::Arc<Image> {
        Image::builder()
            .layer(|l| {
                l.file("/site/good/MANIFEST", "requests 2.22.0")
                    .file("/site/bad/MANIFEST", "garbage")
            })
            .build_shared()
    }

    #[test]
    fn test_requires_at_least_one_parser() {
        let err = GenericCataloger::new("empty", vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_one_failure_keeps_other_packages() {
        let cataloger = GenericCataloger::new(
            "test-cataloger",
            vec![],
            vec![("**/MANIFEST".to_string(), parse_name_version as ParserFn)],
        )
        .unwrap();

        let cataloged = cataloger.catalog(&SquashResolver::new(image())).unwrap();
        assert!(!cataloged.is_complete());

        let (packages, error) = cataloged.into_parts(cataloger.name());
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "requests");
        assert_eq!(packages[0].found_by, "test-cataloger");
        assert_eq!(packages[0].locations[0].real_path, "/site/good/MANIFEST");

        let error = error.unwrap();
        assert!(error.to_string().contains("/site/bad/MANIFEST"));
        assert!(!error.to_string().contains("/site/good/MANIFEST"));
    }

    #[test]
    fn test_globs_run_before_paths() {
        let cataloger = GenericCataloger::new(
            "ordered",
            vec![("/site/good/MANIFEST".to_string(), parse_name_version as ParserFn)],
            vec![("**/good/MANIFEST".to_string(), parse_name_version as ParserFn)],
        )
        .unwrap();
        assert_eq!(cataloger.patterns(), vec!["**/good/MANIFEST", "/site/good/MANIFEST"]);

        // no dedup across patterns
        let cataloged = cataloger.catalog(&SquashResolver::new(image())).unwrap();
        assert_eq!(cataloged.packages.len(), 2);
        assert!(cataloged.is_complete());
    }

    #[test]
    fn test_all_layers_sees_every_occurrence() {
        let image = Image::builder()
            .layer(|l| l.file("/app/MANIFEST", "left-pad 1.0.0"))
            .layer(|l| l.file("/app/MANIFEST", "left-pad 1.3.0"))
            .build_shared();
        let cataloger = GenericCataloger::new(
            "layered",
            vec![("/app/MANIFEST".to_string(), parse_name_version as ParserFn)],
            vec![],
        )
        .unwrap();

        let squashed = cataloger.catalog(&SquashResolver::new(image.clone())).unwrap();
        assert_eq!(squashed.packages.len(), 1);
        assert_eq!(squashed.packages[0].version, "1.3.0");

        let all = cataloger.catalog(&AllLayersResolver::new(image)).unwrap();
        let versions: Vec<_> = all.packages.iter().map(|p| p.version.as_str()).collect();
        assert_eq!(versions, vec!["1.0.0", "1.3.0"]);
    }

    #[test]
    fn test_invalid_glob_is_fatal() {
        let cataloger = GenericCataloger::new(
            "broken",
            vec![],
            vec![("".to_string(), parse_name_version as ParserFn)],
        )
        .unwrap();
        assert!(matches!(
            cataloger.catalog(&SquashResolver::new(image())),
            Err(Error::Glob { .. })
        ));
    }
}
