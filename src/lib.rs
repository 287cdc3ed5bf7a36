//! Inventory the software packages inside a container image or a directory
//! tree without running it.
//!
//! # Example
//!
//! ```no_run
//! use layerscan::cataloger::all_catalogers;
//! use layerscan::source::{resolve, Scope};
//! use layerscan::{catalog_source, CatalogOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (resolver, cleanup) = resolve(Scope::AllLayers, "image:./unpacked-image")?;
//!     let catalogers = all_catalogers()?;
//!
//!     let report = catalog_source(resolver.as_ref(), &catalogers, &CatalogOptions::default()).await;
//!     for package in &report.packages {
//!         println!("{} {} ({})", package.name, package.version, package.found_by);
//!     }
//!
//!     cleanup.run();
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cataloger;
pub mod config;
pub mod cpe;
pub mod error;
pub mod glob;
pub mod image;
pub mod indexer;
pub mod logging;
pub mod model;
pub mod output;
pub mod source;

pub use catalog::{catalog_source, CatalogOptions, CatalogReport};
pub use cataloger::{Cataloger, GenericCataloger};
pub use config::Config;
pub use cpe::{generate_cpes, Cpe, CpeFieldCandidates};
pub use error::{Error, Result};
pub use model::{CatalogResult, Ecosystem, Language, Metadata, Package, PackageType};
pub use source::{resolve, Location, Resolver, Scope};
