//! Runs a set of catalogers over one source.

use crate::cataloger::Cataloger;
use crate::config::IgnoreConfig;
use crate::cpe::generate_cpes;
use crate::error::Error;
use crate::model::Package;
use crate::source::Resolver;
use futures::future::join_all;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Run catalogers concurrently instead of one after another.
    pub parallel: bool,
    pub generate_cpes: bool,
    pub ignore: IgnoreConfig,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            generate_cpes: true,
            ignore: IgnoreConfig::default(),
        }
    }
}

/// Everything a run produced. `errors` holds one aggregate per cataloger that
/// had failures; `packages` is still complete for every location that parsed.
#[derive(Debug, Default)]
pub struct CatalogReport {
    pub packages: Vec<Package>,
    pub errors: Vec<Error>,
}

impl CatalogReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs `catalogers` against `resolver`, attaches CPEs and drops ignored packages.
///
/// Packages keep cataloger order regardless of `parallel`.
pub async fn catalog_source(
    resolver: &dyn Resolver,
    catalogers: &[Box<dyn Cataloger>],
    options: &CatalogOptions,
) -> CatalogReport {
    let results = if options.parallel && catalogers.len() > 1 {
        let futures = catalogers.iter().map(|c| c.catalog(resolver));
        join_all(futures).await
    } else {
        let mut results = Vec::with_capacity(catalogers.len());
        for cataloger in catalogers {
            results.push(cataloger.catalog(resolver).await);
        }
        results
    };

    let mut report = CatalogReport::default();
    for (cataloger, result) in catalogers.iter().zip(results) {
        let cataloged = match result {
            Ok(cataloged) => cataloged,
            Err(e) => {
                warn!(cataloger = cataloger.name(), error = %e, "cataloger failed");
                report.errors.push(e);
                continue;
            }
        };

        let (packages, error) = cataloged.into_parts(cataloger.name());
        if let Some(e) = error {
            report.errors.push(e);
        }

        for mut package in packages {
            if options.ignore.should_ignore_package(&package.name) {
                debug!(package = %package.name, "ignored by config");
                continue;
            }
            if options.generate_cpes {
                let candidates = cataloger.cpe_candidates(&package);
                package.cpes = generate_cpes(&package.name, &package.version, candidates.as_ref());
            }
            report.packages.push(package);
        }
    }

    info!(
        catalogers = catalogers.len(),
        packages = report.packages.len(),
        errors = report.errors.len(),
        "cataloging finished"
    );
    report
}
