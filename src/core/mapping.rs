//! Column mapping from free-form spreadsheet headers to canonical BOM fields

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Logical BOM columns recognized in a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    PartNumber,
    Description,
    Qty,
    Revision,
    Material,
    Finish,
    LineType,
    Status,
    Unit,
    /// Position column; feeds both `item_no` and `line_no`
    LineNo,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::PartNumber => "part_number",
            CanonicalField::Description => "description",
            CanonicalField::Qty => "qty",
            CanonicalField::Revision => "revision",
            CanonicalField::Material => "material",
            CanonicalField::Finish => "finish",
            CanonicalField::LineType => "line_type",
            CanonicalField::Status => "status",
            CanonicalField::Unit => "unit",
            CanonicalField::LineNo => "line_no",
        }
    }

    /// Normalized synonyms for this field (Dutch and English)
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::PartNumber => &[
                "partno",
                "partnumber",
                "pn",
                "itemcode",
                "onderdeelnummer",
                "artikel",
            ],
            CanonicalField::Description => &["description", "desc", "omschrijving"],
            CanonicalField::Qty => &["qty", "quantity", "aantal", "stuks"],
            CanonicalField::Revision => &["rev", "revision", "versie"],
            CanonicalField::Material => &["material", "materiaal"],
            CanonicalField::Finish => &["finish", "afwerking"],
            CanonicalField::LineType => &["type", "parttype", "componenttype"],
            CanonicalField::Status => &["status", "approvalstatus", "state"],
            CanonicalField::Unit => &["uom", "unit", "eenheid"],
            CanonicalField::LineNo => &["item", "itemno", "line", "regel", "pos", "position"],
        }
    }

    /// All fields, in synonym lookup order
    pub fn all() -> &'static [CanonicalField] {
        &[
            CanonicalField::PartNumber,
            CanonicalField::Description,
            CanonicalField::Qty,
            CanonicalField::Revision,
            CanonicalField::Material,
            CanonicalField::Finish,
            CanonicalField::LineType,
            CanonicalField::Status,
            CanonicalField::Unit,
            CanonicalField::LineNo,
        ]
    }

    /// Look up the canonical field for a raw header cell
    pub fn from_header(raw: &str) -> Option<Self> {
        let norm = normalize_header(raw);
        if norm.is_empty() {
            return None;
        }
        Self::all().iter().copied().find(|field| {
            normalize_header(field.as_str()) == norm || field.synonyms().contains(&norm.as_str())
        })
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase and keep only ASCII alphanumerics ("Item No." -> "itemno")
pub fn normalize_header(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Map header cells to canonical fields, keyed by column index.
///
/// Unrecognized columns are left out. Two columns may map to the same field.
pub fn map_headers<I, S>(headers: I) -> BTreeMap<usize, CanonicalField>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    headers
        .into_iter()
        .enumerate()
        .filter_map(|(idx, raw)| CanonicalField::from_header(raw.as_ref()).map(|f| (idx, f)))
        .collect()
}

/// Parse a quantity, accepting a comma as decimal separator ("1,5" -> 1.5)
pub fn parse_qty(value: &str) -> Option<f64> {
    let text = value.trim().replace(',', ".");
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_headers_handles_synonyms() {
        let headers = [
            "Part No",
            "Omschrijving",
            "Aantal",
            "Rev",
            "Materiaal",
            "Finish",
            "Type",
            "Status",
            "Item No.",
        ];
        let mapping = map_headers(headers);
        assert_eq!(mapping[&0], CanonicalField::PartNumber);
        assert_eq!(mapping[&1], CanonicalField::Description);
        assert_eq!(mapping[&2], CanonicalField::Qty);
        assert_eq!(mapping[&3], CanonicalField::Revision);
        assert_eq!(mapping[&4], CanonicalField::Material);
        assert_eq!(mapping[&5], CanonicalField::Finish);
        assert_eq!(mapping[&6], CanonicalField::LineType);
        assert_eq!(mapping[&7], CanonicalField::Status);
        assert_eq!(mapping[&8], CanonicalField::LineNo);
    }

    #[test]
    fn test_every_synonym_maps_regardless_of_case_and_punctuation() {
        for field in CanonicalField::all() {
            for synonym in field.synonyms() {
                let shouty = format!(" {}. ", synonym.to_uppercase());
                assert_eq!(
                    CanonicalField::from_header(&shouty),
                    Some(*field),
                    "synonym {:?} should map to {}",
                    synonym,
                    field
                );
            }
        }
    }

    #[test]
    fn test_unrecognized_and_blank_headers_are_omitted() {
        let mapping = map_headers(["Part Number", "", "Supplier notes", "Qty"]);
        assert_eq!(mapping.len(), 2);
        assert!(!mapping.contains_key(&1));
        assert!(!mapping.contains_key(&2));
    }

    #[test]
    fn test_duplicate_targets_are_tolerated() {
        let mapping = map_headers(["Qty", "Part Number", "Aantal"]);
        assert_eq!(mapping[&0], CanonicalField::Qty);
        assert_eq!(mapping[&2], CanonicalField::Qty);
    }

    #[test]
    fn test_parse_qty_supports_comma_decimal() {
        assert_eq!(parse_qty("1,5"), Some(1.5));
        assert_eq!(parse_qty("2"), Some(2.0));
        assert_eq!(parse_qty(" 3.25 "), Some(3.25));
        assert_eq!(parse_qty(""), None);
        assert_eq!(parse_qty("a few"), None);
    }
}
