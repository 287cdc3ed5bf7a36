use crate::model::CatalogResult;
use anyhow::Result;

pub fn print_json(result: &CatalogResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{}", json);
    Ok(())
}
