//! CPE (Common Platform Enumeration) values and candidate generation.
//!
//! Fields are stored unescaped: `\$0.99` and `%240.99` both become `$0.99`,
//! so a CPE parsed from a binding string and one built field by field compare
//! equal when they name the same thing.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Matches any value.
pub const ANY: &str = "*";
/// Not applicable.
pub const NA: &str = "-";

const FS_PREFIX: &str = "cpe:2.3:";
const URI_PREFIX: &str = "cpe:/";
const FS_FIELDS: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cpe {
    pub part: String,
    pub vendor: String,
    pub product: String,
    pub version: String,
    pub update: String,
    pub edition: String,
    pub language: String,
    pub sw_edition: String,
    pub target_sw: String,
    pub target_hw: String,
    pub other: String,
}

impl Default for Cpe {
    fn default() -> Self {
        Self::any()
    }
}

impl Cpe {
    /// A CPE with every field set to [`ANY`].
    pub fn any() -> Self {
        Self {
            part: ANY.to_string(),
            vendor: ANY.to_string(),
            product: ANY.to_string(),
            version: ANY.to_string(),
            update: ANY.to_string(),
            edition: ANY.to_string(),
            language: ANY.to_string(),
            sw_edition: ANY.to_string(),
            target_sw: ANY.to_string(),
            target_hw: ANY.to_string(),
            other: ANY.to_string(),
        }
    }

    /// Parses a 2.3 formatted string (`cpe:2.3:...`) or a 2.2 URI (`cpe:/...`).
    pub fn new(binding: &str) -> Result<Self> {
        let parsed = if let Some(rest) = binding.strip_prefix(FS_PREFIX) {
            parse_formatted_string(binding, rest)?
        } else if let Some(rest) = binding.strip_prefix(URI_PREFIX) {
            parse_uri(binding, rest)?
        } else {
            return Err(cpe_error(binding, "expected a cpe:2.3: or cpe:/ prefix"));
        };
        Ok(parsed.normalized())
    }

    /// Binds to the 2.3 formatted string form.
    pub fn bind_to_fmt_string(&self) -> String {
        let fields: Vec<String> = self.fields().iter().map(|f| bind_field(f)).collect();
        format!("{}{}", FS_PREFIX, fields.join(":"))
    }

    fn fields(&self) -> [&str; FS_FIELDS] {
        [
            &self.part,
            &self.vendor,
            &self.product,
            &self.version,
            &self.update,
            &self.edition,
            &self.language,
            &self.sw_edition,
            &self.target_sw,
            &self.target_hw,
            &self.other,
        ]
    }

    fn from_fields(fields: [String; FS_FIELDS]) -> Self {
        let [part, vendor, product, version, update, edition, language, sw_edition, target_sw, target_hw, other] =
            fields;
        Self {
            part,
            vendor,
            product,
            version,
            update,
            edition,
            language,
            sw_edition,
            target_sw,
            target_hw,
            other,
        }
    }

    /// Strips escape backslashes from every field.
    fn normalized(self) -> Self {
        let fields = self.fields().map(strip_slashes);
        Self::from_fields(fields)
    }
}

impl FromStr for Cpe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Cpe::new(s)
    }
}

impl fmt::Display for Cpe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bind_to_fmt_string())
    }
}

impl Serialize for Cpe {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cpe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Cpe::new(&raw).map_err(serde::de::Error::custom)
    }
}

fn cpe_error(input: &str, reason: impl Into<String>) -> Error {
    Error::Cpe {
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn parse_formatted_string(input: &str, rest: &str) -> Result<Cpe> {
    let mut fields = Vec::with_capacity(FS_FIELDS);
    let mut current = String::new();
    let mut chars = rest.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => {
                    current.push('\\');
                    current.push(escaped);
                }
                None => return Err(cpe_error(input, "dangling escape character")),
            },
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    if fields.len() != FS_FIELDS {
        return Err(cpe_error(
            input,
            format!("expected {} fields, found {}", FS_FIELDS, fields.len()),
        ));
    }
    if let Some(i) = fields.iter().position(|f| f.is_empty()) {
        return Err(cpe_error(input, format!("field {} is empty", i + 1)));
    }
    check_part(input, &fields[0])?;

    let fields: [String; FS_FIELDS] = fields
        .try_into()
        .map_err(|_| cpe_error(input, "wrong field count"))?;
    Ok(Cpe::from_fields(fields))
}

fn parse_uri(input: &str, rest: &str) -> Result<Cpe> {
    let components: Vec<&str> = rest.split(':').collect();
    if components.len() > 7 {
        return Err(cpe_error(input, "too many components"));
    }

    let mut cpe = Cpe::any();
    let mut decoded = Vec::with_capacity(components.len());
    for component in &components {
        decoded.push(decode_uri_component(input, component)?);
    }

    let mut slots = [
        &mut cpe.part,
        &mut cpe.vendor,
        &mut cpe.product,
        &mut cpe.version,
        &mut cpe.update,
    ];
    for (slot, value) in slots.iter_mut().zip(decoded.iter()) {
        **slot = value.clone();
    }

    if let Some(edition) = components.get(5) {
        if let Some(packed) = edition.strip_prefix('~') {
            let parts: Vec<&str> = packed.split('~').collect();
            if parts.len() != 5 {
                return Err(cpe_error(input, "packed edition must have 5 parts"));
            }
            cpe.edition = decode_uri_component(input, parts[0])?;
            cpe.sw_edition = decode_uri_component(input, parts[1])?;
            cpe.target_sw = decode_uri_component(input, parts[2])?;
            cpe.target_hw = decode_uri_component(input, parts[3])?;
            cpe.other = decode_uri_component(input, parts[4])?;
        } else {
            cpe.edition = decoded[5].clone();
        }
    }
    if let Some(language) = decoded.get(6) {
        cpe.language = language.clone();
    }

    check_part(input, &cpe.part)?;
    Ok(cpe)
}

fn check_part(input: &str, part: &str) -> Result<()> {
    match part {
        "a" | "o" | "h" | ANY | NA => Ok(()),
        other => Err(cpe_error(input, format!("invalid part {:?}", other))),
    }
}

/// Decodes one URI component: empty means ANY, `-` means NA, `%xx` is a byte.
fn decode_uri_component(input: &str, component: &str) -> Result<String> {
    if component.is_empty() {
        return Ok(ANY.to_string());
    }
    if component == NA {
        return Ok(NA.to_string());
    }

    let bytes = component.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = component
                .get(i + 1..i + 3)
                .ok_or_else(|| cpe_error(input, "truncated percent encoding"))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| cpe_error(input, format!("invalid percent encoding %{}", hex)))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| cpe_error(input, "percent encoding is not valid UTF-8"))
}

fn strip_slashes(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn bind_field(value: &str) -> String {
    if value.is_empty() {
        return ANY.to_string();
    }
    if value == ANY || value == NA {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Per-ecosystem hints for CPE generation. `None` lists default to the package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpeFieldCandidates {
    pub vendor: Option<Vec<String>>,
    pub product: Option<Vec<String>>,
    pub target_sw: Vec<String>,
}

/// Builds the deduplicated product × vendor × target-software candidates for a package.
///
/// The vendor and target-software sweeps always start with [`ANY`], so the
/// unqualified match is present even when hints are given. Output order is
/// the cross-product order with later duplicates dropped.
pub fn generate_cpes(name: &str, version: &str, candidates: Option<&CpeFieldCandidates>) -> Vec<Cpe> {
    let default_list = || vec![name.to_string()];
    let products = candidates
        .and_then(|c| c.product.clone())
        .unwrap_or_else(default_list);
    let vendors = candidates
        .and_then(|c| c.vendor.clone())
        .unwrap_or_else(default_list);
    let target_sw = candidates.map(|c| c.target_sw.clone()).unwrap_or_default();
    let version = or_any(version);

    let products: Vec<&str> = products.iter().map(|p| or_any(p)).collect();
    let vendor_sweep: Vec<&str> = std::iter::once(ANY).chain(vendors.iter().map(|v| or_any(v))).collect();
    let target_sweep: Vec<&str> = std::iter::once(ANY).chain(target_sw.iter().map(|t| or_any(t))).collect();

    let mut keys = HashSet::new();
    let mut cpes = Vec::new();
    for product in &products {
        for vendor in &vendor_sweep {
            for target in &target_sweep {
                let key = format!("{}|{}|{}|{}", product, vendor, version, target);
                if !keys.insert(key) {
                    continue;
                }
                cpes.push(Cpe {
                    product: product.to_string(),
                    vendor: vendor.to_string(),
                    version: version.to_string(),
                    target_sw: target.to_string(),
                    ..Cpe::any()
                });
            }
        }
    }
    cpes
}

/// An empty value carries no information, which is what [`ANY`] means.
fn or_any(value: &str) -> &str {
    if value.is_empty() {
        ANY
    } else {
        value
    }
}
