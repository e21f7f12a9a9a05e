#![cfg(not(tarpaulin_include))]

use crate::catalog::{Catalog, Ingredient, check_cost};
use crate::downloader::CATALOG_HEADERS;
use crate::error::{RecetarioError, Result};
use std::fs;
use std::path::Path;

/// A single spreadsheet cell as the importers see it.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Text(String),
    Number(f64),
    Empty,
}

impl SheetCell {
    fn as_text(&self) -> String {
        match self {
            SheetCell::Text(s) => s.clone(),
            SheetCell::Number(n) => n.to_string(),
            SheetCell::Empty => String::new(),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            SheetCell::Text(s) => s.trim().is_empty(),
            SheetCell::Number(_) => false,
            SheetCell::Empty => true,
        }
    }
}

/// Load an ingredient catalog from CSV text
///
/// The first line must be a header naming the `Nombre`, `Unidad_Base` and
/// `Costo_Por_Unidad` columns, in any order. Blank lines are skipped. Unquoted
/// fields are trimmed; quoted fields are kept verbatim and may span lines. The
/// result is a complete catalog meant to replace the current one wholesale.
///
/// # Arguments
/// * `text` - CSV content
///
/// # Returns
/// * `Result<Catalog>` - The imported catalog, or a `Sheet` error naming the
///   offending row
///
/// # Examples
/// ```
/// use recetario::loader::from_csv_str;
///
/// let catalog = from_csv_str("Nombre,Unidad_Base,Costo_Por_Unidad\nharina,g,0.002\n").unwrap();
/// assert_eq!(catalog.get("harina").unwrap().cost_per_unit, 0.002);
/// ```
pub fn from_csv_str(text: &str) -> Result<Catalog> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rows: Vec<Vec<SheetCell>> = parse_csv_records(text)?
        .into_iter()
        .map(|record| record.into_iter().map(SheetCell::Text).collect())
        .collect();

    build_catalog(rows)
}

/// Load an ingredient catalog from a CSV file
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Catalog> {
    let text = fs::read_to_string(filepath)?;
    from_csv_str(&text)
}

/// Load an ingredient catalog from an Excel file
///
/// Reads the first worksheet; same header rules as [`from_csv_str`].
#[cfg(feature = "web")]
pub fn from_xlsx(filepath: impl AsRef<Path>) -> Result<Catalog> {
    let bytes = fs::read(filepath)?;
    from_xlsx_bytes(&bytes)
}

/// Load an ingredient catalog from the bytes of an uploaded Excel file
#[cfg(feature = "web")]
pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Catalog> {
    use calamine::{Data, Reader, Xlsx};
    use std::io::Cursor;

    let sheet_err = |e: calamine::XlsxError| RecetarioError::Sheet(e.to_string());

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(sheet_err)?;

    // Get the first worksheet
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| RecetarioError::Sheet("no sheets found in Excel file".to_string()))?;

    let range = workbook.worksheet_range(&sheet_name).map_err(sheet_err)?;

    let rows: Vec<Vec<SheetCell>> = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => SheetCell::Text(s.clone()),
                    Data::Float(f) => SheetCell::Number(*f),
                    Data::Int(i) => SheetCell::Number(*i as f64),
                    Data::Empty => SheetCell::Empty,
                    other => SheetCell::Text(other.to_string()),
                })
                .collect()
        })
        .collect();

    build_catalog(rows)
}

/// Detect file type and load the appropriate format
///
/// # Arguments
/// * `filepath` - Path to a `.csv` or `.xlsx` file
///
/// # Returns
/// * `Result<Catalog>` - The imported catalog or an error
pub fn load_catalog(filepath: impl AsRef<Path>) -> Result<Catalog> {
    let path = filepath.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv(path),
        #[cfg(feature = "web")]
        Some("xlsx") => from_xlsx(path),
        #[cfg(not(feature = "web"))]
        Some("xlsx") => Err(RecetarioError::Sheet(
            "Excel support requires the 'web' feature".to_string(),
        )),
        Some(ext) => Err(RecetarioError::Sheet(format!(
            "unsupported file extension: {}",
            ext
        ))),
        None => Err(RecetarioError::Sheet("file has no extension".to_string())),
    }
}

/// Turns header + data rows into a catalog. Row numbers in errors are 1-based
/// spreadsheet rows, the header being row 1.
pub fn build_catalog(rows: Vec<Vec<SheetCell>>) -> Result<Catalog> {
    let mut rows = rows
        .into_iter()
        .enumerate()
        .filter(|(_, cells)| !cells.iter().all(SheetCell::is_blank));

    let (_, header) = rows
        .next()
        .ok_or_else(|| RecetarioError::Sheet("spreadsheet is empty".to_string()))?;

    let column = |wanted: &str| {
        header
            .iter()
            .position(|cell| cell.as_text().trim() == wanted)
            .ok_or_else(|| RecetarioError::Sheet(format!("missing column '{}'", wanted)))
    };
    let name_col = column(CATALOG_HEADERS[0])?;
    let unit_col = column(CATALOG_HEADERS[1])?;
    let cost_col = column(CATALOG_HEADERS[2])?;

    let mut catalog = Catalog::new();
    for (index, cells) in rows {
        let row_no = index + 1;
        let cell = |col: usize| cells.get(col).cloned().unwrap_or(SheetCell::Empty);

        let name = cell(name_col).as_text();
        if name.trim().is_empty() {
            return Err(RecetarioError::Sheet(format!("row {}: empty ingredient name", row_no)));
        }

        let cost = match cell(cost_col) {
            SheetCell::Number(n) => n,
            SheetCell::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                RecetarioError::Sheet(format!("row {}: invalid cost '{}'", row_no, s.trim()))
            })?,
            SheetCell::Empty => {
                return Err(RecetarioError::Sheet(format!("row {}: missing cost", row_no)));
            }
        };
        check_cost(&name, cost)
            .map_err(|e| RecetarioError::Sheet(format!("row {}: {}", row_no, e)))?;

        let ingredient = Ingredient::new(cell(unit_col).as_text(), cost);
        catalog
            .create_ingredient(&name, ingredient)
            .map_err(|e| RecetarioError::Sheet(format!("row {}: {}", row_no, e)))?;
    }

    log::info!("imported {} ingredients from spreadsheet", catalog.len());
    Ok(catalog)
}

// Split CSV text into records of fields. Quoted fields keep their content
// verbatim, newlines included; unquoted fields are trimmed.
fn parse_csv_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut current_field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    let finish_field = |field: &mut String, quoted: &mut bool| {
        let value = std::mem::take(field);
        let value = if *quoted { value } else { value.trim().to_string() };
        *quoted = false;
        value
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current_field.push(c);
            }
            continue;
        }

        match c {
            '"' if !quoted && current_field.trim().is_empty() => {
                // whitespace before the opening quote is padding
                current_field.clear();
                in_quotes = true;
                quoted = true;
            }
            ',' => record.push(finish_field(&mut current_field, &mut quoted)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(finish_field(&mut current_field, &mut quoted));
                records.push(std::mem::take(&mut record));
            }
            _ if quoted => {
                if !c.is_whitespace() {
                    return Err(RecetarioError::Sheet(format!(
                        "row {}: text after closing quote",
                        records.len() + 1
                    )));
                }
            }
            _ => current_field.push(c),
        }
    }

    if in_quotes {
        return Err(RecetarioError::Sheet(format!(
            "row {}: unterminated quoted field",
            records.len() + 1
        )));
    }
    if !record.is_empty() || !current_field.is_empty() || quoted {
        record.push(finish_field(&mut current_field, &mut quoted));
        records.push(record);
    }
    Ok(records)
}
