use anyhow::Result;
use contracts::projections::p901_inventory_directory::DirectoryEntry;
use std::collections::HashMap;

use crate::usecases::u501_sync_from_erp::identity::normalize_refer;

const REFERENCE_COLUMNS: &[&str] = &["REFERENCIA", "REFER", "REFERENCE", "CODIGO"];
const BRAND_NAME_COLUMNS: &[&str] = &["Nombre MARCA", "NOMBRE_MARCA", "MARCA NOMBRE", "DESCRIPCION MARCA"];
const CLASS_NAME_COLUMNS: &[&str] = &["Nombre CLASE", "NOMBRE_CLASE", "CLASE NOMBRE", "DESCRIPCION CLASE"];
const BRAND_CODE_COLUMNS: &[&str] = &["MARCA", "COD MARCA", "CODIGO MARCA", "COD_MARCA"];
const CLASS_CODE_COLUMNS: &[&str] = &["CLASE", "COD CLASE", "CODIGO CLASE", "COD_CLASE"];

/// Результат разбора CSV справочника
#[derive(Debug, Default)]
pub struct ParsedDirectory {
    /// Уникальные по референсу записи, порядок первого появления
    pub entries: Vec<DirectoryEntry>,
    pub rows_read: usize,
    pub skipped: usize,
}

/// Разобрать CSV справочника номенклатуры.
///
/// Формат: разделитель `;`, UTF-8 (BOM допустим), обязательная строка заголовков,
/// столбцы ищутся по имени без учёта регистра. При повторе референса побеждает последняя строка.
pub fn parse_directory_csv(csv_text: &str) -> Result<ParsedDirectory> {
    // Strip UTF-8 BOM if present
    let text = csv_text.trim_start_matches('\u{FEFF}');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => anyhow::bail!("Failed to read CSV headers: {}", e),
    };

    let column = |aliases: &[&str]| -> Option<usize> {
        aliases.iter().find_map(|alias| {
            headers
                .iter()
                .position(|h| header_key(h) == header_key(alias))
        })
    };

    let Some(reference_col) = column(REFERENCE_COLUMNS) else {
        anyhow::bail!(
            "CSV has no REFERENCIA column (headers: {:?})",
            headers.iter().collect::<Vec<_>>()
        );
    };
    let brand_col = column(BRAND_NAME_COLUMNS);
    let class_col = column(CLASS_NAME_COLUMNS);
    let brand_code_col = column(BRAND_CODE_COLUMNS);
    let class_code_col = column(CLASS_CODE_COLUMNS);

    let mut parsed = ParsedDirectory::default();
    let mut position_by_ref: HashMap<String, usize> = HashMap::new();

    for result in reader.records() {
        parsed.rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping malformed directory CSV record: {}", e);
                parsed.skipped += 1;
                continue;
            }
        };

        let get_field = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let reference = normalize_refer(&get_field(Some(reference_col)).unwrap_or_default());
        if reference.is_empty() {
            parsed.skipped += 1;
            continue;
        }

        let entry = DirectoryEntry {
            reference: reference.clone(),
            brand_code: get_field(brand_code_col),
            brand: get_field(brand_col),
            class_code: get_field(class_code_col),
            class_name: get_field(class_col),
        };

        match position_by_ref.get(&reference) {
            Some(&pos) => parsed.entries[pos] = entry,
            None => {
                position_by_ref.insert(reference, parsed.entries.len());
                parsed.entries.push(entry);
            }
        }
    }

    tracing::info!(
        "Directory CSV parsed: rows={}, unique={}, skipped={}",
        parsed.rows_read,
        parsed.entries.len(),
        parsed.skipped
    );

    Ok(parsed)
}

/// "Nombre  marca" == "NOMBRE MARCA" == "nombre_marca"
fn header_key(h: &str) -> String {
    h.trim_start_matches('\u{FEFF}')
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_bom_and_case_insensitive_headers() {
        let csv = "\u{FEFF}referencia;nombre marca;NOMBRE CLASE;MARCA;CLASE\n\
                   ref 001;Acme;Tornillos;AC;T1\n\
                   REF-2;Beta;;BT;\n";
        let parsed = parse_directory_csv(csv).unwrap();
        assert_eq!(parsed.rows_read, 2);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(
            parsed.entries[0],
            DirectoryEntry {
                reference: "REF 001".into(),
                brand_code: Some("AC".into()),
                brand: Some("Acme".into()),
                class_code: Some("T1".into()),
                class_name: Some("Tornillos".into()),
            }
        );
        assert_eq!(parsed.entries[1].class_name, None);
    }

    #[test]
    fn test_last_row_wins_per_reference() {
        let csv = "REFERENCIA;Nombre MARCA\nR1;Old\nr1 ;New\nR2;Other\n";
        let parsed = parse_directory_csv(csv).unwrap();
        assert_eq!(parsed.rows_read, 3);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].reference, "R1");
        assert_eq!(parsed.entries[0].brand.as_deref(), Some("New"));
    }

    #[test]
    fn test_quoted_multiline_field() {
        let csv = "REFERENCIA;Nombre MARCA;Nombre CLASE\n\"R1\";\"Marca\nde dos lineas\";\"A;B\"\n";
        let parsed = parse_directory_csv(csv).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].brand.as_deref(), Some("Marca\nde dos lineas"));
        assert_eq!(parsed.entries[0].class_name.as_deref(), Some("A;B"));
    }

    #[test]
    fn test_blank_reference_is_skipped() {
        let csv = "REFERENCIA;Nombre MARCA\n;Acme\n  ;Beta\nR9;Gamma\n";
        let parsed = parse_directory_csv(csv).unwrap();
        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn test_missing_reference_column_fails() {
        assert!(parse_directory_csv("MARCA;CLASE\nA;B\n").is_err());
    }
}
