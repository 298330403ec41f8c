//! CSV parsing with encoding and delimiter auto-detection.
//!
//! Turns raw upload bytes into [`RawRecord`]s keyed by normalized header.
//! No validation happens here and nothing is persisted; the validator and
//! batch layers sit on top.
//!
//! Expected columns (header matching is case- and punctuation-insensitive,
//! so `"Transaction Number"`, `"transaction_number"` and `"TRANSACTION-NUMBER"`
//! all map to the same field):
//!
//! | normalized header       | field                 |
//! |-------------------------|-----------------------|
//! | `transaction_number`    | transaction number    |
//! | `customer_number`       | customer identifier   |
//! | `customer_name`         | customer name         |
//! | `product_code`          | product identifier    |
//! | `product_description`   | product description   |
//! | `quantity`              | unit count            |
//! | `sales_amount`          | monetary amount       |
//! | `cost_of_sales`         | monetary amount       |
//! | `transaction_date`      | date, per-company format |

use crate::error::{ParseError, ParseResult};
use crate::models::RawFields;

/// One data row as read from the file, before validation.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 1-based position among non-blank data rows.
    pub row_number: u32,
    /// Normalized header -> raw trimmed value.
    pub fields: RawFields,
}

impl RawRecord {
    /// Raw value for a normalized header, if the column exists.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Result of parsing a file, with detection metadata.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Data rows in source order; blank rows are skipped, not counted.
    pub records: Vec<RawRecord>,
    /// Detected encoding.
    pub encoding: String,
    /// Detected delimiter.
    pub delimiter: char,
    /// Normalized column headers.
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the detected encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ParseResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        // Fallback: UTF-8 with lossy conversion
        _ => String::from_utf8_lossy(bytes).to_string(),
    };

    if decoded.is_empty() && !bytes.is_empty() {
        return Err(ParseError::Encoding(format!("cannot decode as {}", encoding)));
    }
    Ok(decoded)
}

/// Detect the delimiter by counting candidates in the header line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Normalize a header for field lookup: lowercase, punctuation and spacing
/// collapsed to single underscores.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_matches('"')
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Parse upload bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes(bytes: &[u8]) -> ParseResult<ParsedFile> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    parse_content(&content, delimiter, encoding)
}

/// Parse decoded text with an explicit delimiter.
pub fn parse_content(content: &str, delimiter: char, encoding: String) -> ParseResult<ParsedFile> {
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Malformed(e.to_string()))?
        .iter()
        .map(normalize_header)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut records = Vec::new();
    let mut row_number = 0u32;

    for result in reader.records() {
        let record = result.map_err(|e| ParseError::Malformed(e.to_string()))?;

        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        row_number += 1;
        let mut fields = RawFields::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = record.get(i).unwrap_or("").trim().to_string();
            fields.insert(header.clone(), value);
        }

        records.push(RawRecord { row_number, fields });
    }

    Ok(ParsedFile { records, encoding, delimiter, headers })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_parse() {
        let csv = "Transaction Number,Quantity\nTX-1,5\nTX-2,7";
        let parsed = parse_bytes(csv.as_bytes()).unwrap();

        assert_eq!(parsed.delimiter, ',');
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].row_number, 1);
        assert_eq!(parsed.records[0].get("transaction_number"), Some("TX-1"));
        assert_eq!(parsed.records[1].get("quantity"), Some("7"));
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(normalize_header("Transaction Number"), "transaction_number");
        assert_eq!(normalize_header("  COST-OF-SALES "), "cost_of_sales");
        assert_eq!(normalize_header("\"Customer  Name\""), "customer_name");
        assert_eq!(normalize_header("quantity"), "quantity");
    }

    #[test]
    fn test_blank_rows_skipped_and_not_counted() {
        let csv = "a,b\n1,2\n,\n3,4\n\n";
        let parsed = parse_bytes(csv.as_bytes()).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].row_number, 1);
        assert_eq!(parsed.records[1].row_number, 2);
        assert_eq!(parsed.records[1].get("a"), Some("3"));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Alice\";\"Hello; World\"";
        let parsed = parse_bytes(csv.as_bytes()).unwrap();

        assert_eq!(parsed.delimiter, ';');
        assert_eq!(parsed.records[0].get("value"), Some("Hello; World"));
    }

    #[test]
    fn test_missing_values_are_empty() {
        let csv = "a,b,c\n1,,3";
        let parsed = parse_bytes(csv.as_bytes()).unwrap();

        assert_eq!(parsed.records[0].get("b"), Some(""));
    }

    #[test]
    fn test_short_row_padded_with_empty() {
        let csv = "a,b,c\n1,2";
        let parsed = parse_bytes(csv.as_bytes()).unwrap();

        assert_eq!(parsed.records[0].get("c"), Some(""));
    }

    #[test]
    fn test_empty_file_error() {
        assert!(matches!(parse_bytes(b""), Err(ParseError::EmptyFile)));
        assert!(matches!(parse_bytes(b"   \n  "), Err(ParseError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.starts_with("Soci"));
    }

    #[test]
    fn test_detect_encoding_utf8() {
        assert_eq!(detect_encoding("transaction,date\nTX-1,2024".as_bytes()), "utf-8");
    }
}
