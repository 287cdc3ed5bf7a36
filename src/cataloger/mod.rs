//! Package catalogers.
//!
//! This module provides the [`Cataloger`] trait, the [`GenericCataloger`]
//! that binds file patterns to parser functions, and one cataloger per
//! supported ecosystem.
//!
//! # Available Catalogers
//!
//! | Cataloger | Ecosystem | Files |
//! |-----------|-----------|-------|
//! | [`PythonCataloger`] | Python | `*.egg-info/PKG-INFO`, `*.dist-info/METADATA`, `*.egg-info` |
//! | [`RustCataloger`] | Rust | `Cargo.lock` |
//! | [`JavaScriptCataloger`] | JavaScript | `package.json` |
//!
//! # Example
//!
//! ```no_run
//! use layerscan::cataloger::all_catalogers;
//! use layerscan::source::{resolve, Scope};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (resolver, cleanup) = resolve(Scope::Squashed, "dir:/srv/app")?;
//!     for cataloger in all_catalogers()? {
//!         let cataloged = cataloger.catalog(resolver.as_ref()).await?;
//!         println!("{}: {} packages", cataloger.name(), cataloged.packages.len());
//!     }
//!     cleanup.run();
//!     Ok(())
//! }
//! ```

mod generic;
mod javascript;
mod python;
mod rust;

pub use generic::{Cataloged, GenericCataloger, ParserFn};
pub use javascript::{parse_package_json, JavaScriptCataloger};
pub use python::{parse_wheel_or_egg_metadata, PythonCataloger};
pub use rust::{parse_cargo_lock, RustCataloger};

use crate::cpe::CpeFieldCandidates;
use crate::error::{Error, Result};
use crate::model::{Ecosystem, Package};
use crate::source::Resolver;
use async_trait::async_trait;

/// Discovers packages of one ecosystem through a [`Resolver`].
#[async_trait]
pub trait Cataloger: Send + Sync {
    /// The name stamped on every package this cataloger finds.
    fn name(&self) -> &str;

    fn ecosystem(&self) -> Ecosystem;

    /// The path and glob patterns this cataloger looks at.
    fn patterns(&self) -> Vec<&str>;

    /// Vendor, product and target-software hints for CPE generation.
    ///
    /// `None` falls back to the package name for vendor and product.
    fn cpe_candidates(&self, _package: &Package) -> Option<CpeFieldCandidates> {
        None
    }

    /// Runs one catalog pass.
    ///
    /// # Errors
    ///
    /// Returns an error only when the resolver itself fails; per-file
    /// failures are reported in [`Cataloged::failures`].
    async fn catalog(&self, resolver: &dyn Resolver) -> Result<Cataloged>;
}

type Factory = fn() -> Result<Box<dyn Cataloger>>;

fn new_python() -> Result<Box<dyn Cataloger>> {
    Ok(Box::new(PythonCataloger::new()?))
}

fn new_rust() -> Result<Box<dyn Cataloger>> {
    Ok(Box::new(RustCataloger::new()?))
}

fn new_javascript() -> Result<Box<dyn Cataloger>> {
    Ok(Box::new(JavaScriptCataloger::new()?))
}

static REGISTRY: [(Ecosystem, Factory); 3] = [
    (Ecosystem::Python, new_python),
    (Ecosystem::Rust, new_rust),
    (Ecosystem::JavaScript, new_javascript),
];

/// Returns one cataloger per registered ecosystem, in registry order.
///
/// # Example
///
/// ```
/// use layerscan::cataloger::all_catalogers;
///
/// let catalogers = all_catalogers().unwrap();
/// assert_eq!(catalogers.len(), 3);
/// ```
pub fn all_catalogers() -> Result<Vec<Box<dyn Cataloger>>> {
    REGISTRY.iter().map(|(_, factory)| factory()).collect()
}

/// Returns the cataloger registered for an ecosystem.
///
/// # Example
///
/// ```
/// use layerscan::{cataloger::get_cataloger, Ecosystem};
///
/// let cataloger = get_cataloger(Ecosystem::Rust).unwrap();
/// assert_eq!(cataloger.name(), "rust-cataloger");
/// ```
pub fn get_cataloger(ecosystem: Ecosystem) -> Result<Box<dyn Cataloger>> {
    let (_, factory) = REGISTRY
        .iter()
        .find(|(registered, _)| *registered == ecosystem)
        .ok_or_else(|| Error::Configuration(format!("no cataloger registered for {}", ecosystem)))?;
    factory()
}
