use crate::indexer::FileDigest;
use crate::model::{CatalogResult, PackageType};
use anyhow::Result;
use std::collections::BTreeMap;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Type")]
    package_type: String,
    #[tabled(rename = "License")]
    license: String,
    #[tabled(rename = "Location")]
    location: String,
}

#[derive(Tabled)]
struct DigestRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Layer")]
    layer: String,
    #[tabled(rename = "SHA-256")]
    value: String,
}

pub fn print_cli_table(result: &CatalogResult) -> Result<()> {
    println!();
    println!("{}", render_packages(result));

    if !result.digests.is_empty() {
        println!();
        println!("Indexed {} files:", result.digests.len());
        println!();
        println!("{}", render_digests(&result.digests));
    }

    if !result.errors.is_empty() {
        println!();
        println!("{} cataloger(s) reported failures:", result.errors.len());
        for error in &result.errors {
            println!("  - {}", error);
        }
    }

    println!();
    print_summary(result);

    Ok(())
}

pub(crate) fn render_packages(result: &CatalogResult) -> String {
    if result.packages.is_empty() {
        return "No packages found.".to_string();
    }

    let rows: Vec<PackageRow> = result
        .packages
        .iter()
        .map(|p| PackageRow {
            name: truncate(&p.name, 40),
            version: truncate(&p.version, 20),
            package_type: p.package_type.to_string(),
            license: if p.licenses.is_empty() {
                "-".to_string()
            } else {
                truncate(&p.licenses.join(", "), 30)
            },
            location: p
                .primary_location()
                .map(|l| truncate(&l.to_string(), 60))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_digests(digests: &[FileDigest]) -> String {
    let rows: Vec<DigestRow> = digests
        .iter()
        .map(|d| DigestRow {
            path: truncate(&d.path, 60),
            layer: d
                .layer_index
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
            value: d.value.clone(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn print_summary(result: &CatalogResult) {
    let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    for pkg in &result.packages {
        *by_type.entry(type_label(pkg.package_type)).or_default() += 1;
    }

    println!("Summary:");
    match result.source.scope {
        Some(scope) => println!("  Source: {} ({}, {})", result.source.specifier, result.source.kind, scope),
        None => println!("  Source: {} ({})", result.source.specifier, result.source.kind),
    }
    println!("  Total packages: {}", result.packages.len());

    if by_type.len() > 1 {
        let type_summary: Vec<String> = by_type
            .iter()
            .map(|(t, c)| format!("{} {}", c, t))
            .collect();
        println!("  By type: {}", type_summary.join(", "));
    }
}

fn type_label(package_type: PackageType) -> &'static str {
    match package_type {
        PackageType::Python => "Python",
        PackageType::RustCrate => "Rust crates",
        PackageType::Npm => "npm",
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
