use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;

use crate::{
    error::{ImportError, ItemError},
    inventory::{parse_price, NewItem},
};

const NAME_COLUMNS: &[&str] = &["name", "product_name", "item_name", "product", "item", "title"];
const PRICE_COLUMNS: &[&str] = &["price", "cost", "amount", "value", "unit_price"];
const MISSING_NAMES: &[&str] = &["nan", "null", "none"];
const MAX_REPORTED_ERRORS: usize = 10;

/// Column positions for the name and price fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: usize,
    pub price: usize,
}

impl ColumnMap {
    /// First header containing a known variation wins, compared lowercased.
    pub fn detect(headers: &StringRecord) -> Result<Self, ImportError> {
        let find = |variations: &[&str]| {
            headers.iter().position(|header| {
                let header = header.trim().to_lowercase();
                variations.iter().any(|v| header.contains(v))
            })
        };

        let name = find(NAME_COLUMNS).ok_or(ImportError::MissingNameColumn)?;
        let price = find(PRICE_COLUMNS).ok_or(ImportError::MissingPriceColumn)?;
        Ok(Self { name, price })
    }
}

/// Reads a catalog CSV and returns validated items tagged with their file row.
///
/// Row numbers count the header as row 1, so the first data row is row 2.
pub fn import_csv(bytes: &[u8]) -> Result<Vec<NewItem>, ImportError> {
    let content = clean_content(&decode(bytes));
    if content.is_empty() {
        return Err(ImportError::Empty);
    }

    let (headers, rows) = match read_table(&content, b',') {
        Ok((headers, rows)) if headers.len() > 1 => (headers, rows),
        _ => read_table(&content, b';')?,
    };
    let columns = ColumnMap::detect(&headers)?;

    let rows: Vec<StringRecord> = rows
        .into_iter()
        .filter(|row| row.iter().any(|field| !field.trim().is_empty()))
        .collect();
    if rows.is_empty() {
        return Err(ImportError::NoRows);
    }

    let mut raw_items = vec![];
    let mut errors = vec![];
    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 2;
        match read_row(row, columns) {
            Ok((name, price)) => raw_items.push((line, name, price)),
            Err(e) => errors.push(format!("Row {line}: {e}")),
        }
    }
    if !errors.is_empty() {
        return Err(ImportError::Rows(summarize(&errors)));
    }

    let mut items = vec![];
    for (line, name, price) in raw_items {
        match NewItem::validate(&name, price) {
            Ok(item) => items.push(item.with_row(line)),
            Err(e) => errors.push(format!("Row {line}: {e}")),
        }
    }
    if !errors.is_empty() {
        return Err(ImportError::Validation(summarize(&errors)));
    }
    if items.is_empty() {
        return Err(ImportError::NoItems);
    }

    tracing::debug!("Imported {} catalog rows", items.len());
    Ok(items)
}

fn read_table(content: &str, delimiter: u8) -> Result<(StringRecord, Vec<StringRecord>), ImportError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok((headers, rows))
}

fn read_row(row: &StringRecord, columns: ColumnMap) -> Result<(String, Decimal), ItemError> {
    let name = row.get(columns.name).unwrap_or_default().trim();
    if name.is_empty() || MISSING_NAMES.contains(&name.to_lowercase().as_str()) {
        return Err(ItemError::MissingName);
    }

    let price = parse_price(row.get(columns.price).unwrap_or_default())?;
    Ok((name.to_string(), price))
}

fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Latin-1 maps each byte straight to the code point of the same value
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn clean_content(content: &str) -> String {
    content
        .replace('\u{feff}', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize(errors: &[String]) -> String {
    let mut message = errors
        .iter()
        .take(MAX_REPORTED_ERRORS)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if errors.len() > MAX_REPORTED_ERRORS {
        message.push_str(&format!("\n... and {} more errors", errors.len() - MAX_REPORTED_ERRORS));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_import() {
        let csv = "Product Name,Unit Price\nGold Chiavari Chair,$8.50\nRound Table,\"$1,250.00\"\n";
        let items = import_csv(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Gold Chiavari Chair");
        assert_eq!(items[0].price, Decimal::new(850, 2));
        assert_eq!(items[0].row, Some(2));
        assert_eq!(items[1].price, Decimal::new(125000, 2));
        assert_eq!(items[1].row, Some(3));
    }

    #[test]
    fn test_bom_and_blank_lines() {
        let csv = "\u{feff}name,price\n\nLinen Napkin,0.75\n\n";
        let items = import_csv(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Linen Napkin");
    }

    #[test]
    fn test_semicolon_delimiter() {
        let csv = "item;cost\nTent 20x20;450\n";
        let items = import_csv(csv.as_bytes()).unwrap();
        assert_eq!(items[0].name, "Tent 20x20");
        assert_eq!(items[0].price, Decimal::from(450));
    }

    #[test]
    fn test_latin1_fallback() {
        let mut bytes = b"name,price\nCr".to_vec();
        bytes.push(0xe8);
        bytes.extend_from_slice(b"me Linen,12\n");
        let items = import_csv(&bytes).unwrap();
        assert_eq!(items[0].name, "Crème Linen");
    }

    #[test]
    fn test_missing_columns() {
        assert!(matches!(
            import_csv(b"sku,price\nA1,2\n"),
            Err(ImportError::MissingNameColumn)
        ));
        assert!(matches!(
            import_csv(b"name,qty\nChair,2\n"),
            Err(ImportError::MissingPriceColumn)
        ));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(import_csv(b""), Err(ImportError::Empty)));
        assert!(matches!(import_csv(b"name,price\n"), Err(ImportError::NoRows)));
    }

    #[test]
    fn test_row_errors_are_numbered() {
        let csv = "name,price\nChair,5\nnan,3\nTable,abc\n";
        let Err(ImportError::Rows(message)) = import_csv(csv.as_bytes()) else {
            panic!("expected row errors");
        };
        assert_eq!(
            message,
            "Row 3: Product name cannot be empty\nRow 4: Invalid price format: abc"
        );
    }

    #[test]
    fn test_error_list_is_capped() {
        let mut csv = String::from("name,price\n");
        for _ in 0..13 {
            csv.push_str("null,1\n");
        }
        let Err(ImportError::Rows(message)) = import_csv(csv.as_bytes()) else {
            panic!("expected row errors");
        };
        assert_eq!(message.lines().count(), 11);
        assert!(message.ends_with("... and 3 more errors"));
    }

    #[test]
    fn test_validation_errors() {
        let csv = "name,price\nX,5\nChair,0\n";
        let Err(ImportError::Validation(message)) = import_csv(csv.as_bytes()) else {
            panic!("expected validation errors");
        };
        assert!(message.contains("Row 2: Product name must be at least 2 characters"));
        assert!(message.contains("Row 3: Price must be positive"));
    }
}
