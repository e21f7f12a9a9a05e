#![cfg(not(tarpaulin_include))]

use crate::catalog::Catalog;
use crate::error::Result;

/// Column headers of the catalog spreadsheet, in export order.
pub const CATALOG_HEADERS: [&str; 3] = ["Nombre", "Unidad_Base", "Costo_Por_Unidad"];

/// Convert the ingredient catalog to CSV format
///
/// Writes a header row (`Nombre,Unidad_Base,Costo_Por_Unidad`) followed by one
/// row per ingredient. Text containing commas, quotes, newlines or edge
/// whitespace is quoted, and costs are printed with full round-trip precision
/// so that importing the file reproduces the catalog exactly.
///
/// # Arguments
/// * `catalog` - Reference to the catalog to convert
///
/// # Returns
/// * `Result<String>` - CSV content as a string
///
/// # Examples
/// ```
/// use recetario::catalog::{Catalog, Ingredient};
/// use recetario::downloader::to_csv;
///
/// let mut catalog = Catalog::new();
/// catalog.create_ingredient("harina", Ingredient::new("g", 0.002)).unwrap();
///
/// let csv = to_csv(&catalog).unwrap();
/// assert_eq!(csv, "Nombre,Unidad_Base,Costo_Por_Unidad\nharina,g,0.002\n");
/// ```
pub fn to_csv(catalog: &Catalog) -> Result<String> {
    let mut csv_content = CATALOG_HEADERS.join(",");
    csv_content.push('\n');

    for (name, ingredient) in catalog {
        csv_content.push_str(&escape_field(name));
        csv_content.push(',');
        csv_content.push_str(&escape_field(&ingredient.unit));
        csv_content.push(',');
        csv_content.push_str(&ingredient.cost_per_unit.to_string());
        csv_content.push('\n');
    }

    Ok(csv_content)
}

/// Convert the ingredient catalog to XLSX format
///
/// Produces a single worksheet named `Ingredientes` with the same three columns
/// as the CSV export. Costs are written as numeric cells.
///
/// # Arguments
/// * `catalog` - Reference to the catalog to convert
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes
#[cfg(feature = "web")]
pub fn to_xlsx(catalog: &Catalog) -> Result<Vec<u8>> {
    use crate::error::RecetarioError;
    use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

    let sheet_err = |e: XlsxError| RecetarioError::Sheet(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Ingredientes").map_err(sheet_err)?;

    for (col, header) in CATALOG_HEADERS.iter().enumerate() {
        worksheet
            .write_string(0, col as u16, *header)
            .map_err(sheet_err)?;
    }

    for (index, (name, ingredient)) in catalog.iter().enumerate() {
        let row = (index + 1) as u32;
        worksheet.write_string(row, 0, name).map_err(sheet_err)?;
        worksheet
            .write_string(row, 1, &ingredient.unit)
            .map_err(sheet_err)?;
        worksheet
            .write_number(row, 2, ingredient.cost_per_unit)
            .map_err(sheet_err)?;
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer().map_err(sheet_err)?;

    Ok(buffer)
}

/// Download file name for an export, stamped with today's date,
/// e.g. `catalogo_20261019.xlsx`.
pub fn export_file_name(extension: &str) -> String {
    format!(
        "catalogo_{}.{}",
        chrono::Local::now().format("%Y%m%d"),
        extension
    )
}

fn escape_field(value: &str) -> String {
    let padded = value.trim() != value;
    if padded || value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
