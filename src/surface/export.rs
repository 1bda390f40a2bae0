//! CSV and XLSX rendering of entity rows.
//!
//! XLSX output is the smallest valid SpreadsheetML package: one sheet with
//! inline strings, written with `zip`.

use crate::case::slugify;
use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::surface::Serializable;
use serde_json::Value;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// Chosen by substring of the `export` parameter; anything but xlsx is CSV.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some(p) if p.contains("xlsx") && !p.contains("csv") => ExportFormat::Xlsx,
            _ => ExportFormat::Csv,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => "application/vnd.ms-excel",
        }
    }

    pub fn render(&self, fields: &[String], rows: &[Value]) -> Result<Vec<u8>, AppError> {
        match self {
            ExportFormat::Csv => render_csv(fields, rows),
            ExportFormat::Xlsx => render_xlsx(fields, rows),
        }
    }
}

/// Columns of an export: `export_fields`, else the serializer schema.
pub fn export_fields(entity: &ResolvedEntity) -> Vec<String> {
    entity
        .overrides
        .export_fields
        .clone()
        .unwrap_or_else(|| entity.serializer_schema())
}

/// `<slug of verbose name>.<ext>`, falling back to the alias.
pub fn export_filename(entity: &ResolvedEntity, format: ExportFormat) -> String {
    let mut stem = slugify(&entity.verbose_name);
    if stem.is_empty() {
        stem = slugify(&entity.alias);
    }
    format!("{}.{}", stem, format.extension())
}

fn cell_text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_csv(fields: &[String], rows: &[Value]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| AppError::Export(format!("failed to write CSV header: {}", e)))?;
    for row in rows {
        let record: Vec<String> = fields.iter().map(|f| cell_text(row.get(f))).collect();
        writer
            .write_record(&record)
            .map_err(|e| AppError::Export(format!("failed to write CSV row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Export(format!("failed to flush CSV: {}", e)))
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// Spreadsheet column name of a 0-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn cell_xml(reference: &str, v: Option<&Value>) -> String {
    match v {
        Some(Value::Number(n)) => format!("<c r=\"{}\"><v>{}</v></c>", reference, n),
        Some(Value::Bool(b)) => format!("<c r=\"{}\" t=\"b\"><v>{}</v></c>", reference, u8::from(*b)),
        other => format!(
            "<c r=\"{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            reference,
            xml_escape(&cell_text(other))
        ),
    }
}

fn sheet_xml(fields: &[String], rows: &[Value]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
    );
    let header: Vec<Option<Value>> = fields.iter().map(|f| Some(Value::String(f.clone()))).collect();
    let body = rows
        .iter()
        .map(|r| fields.iter().map(|f| r.get(f).cloned()).collect::<Vec<_>>());
    for (i, cells) in std::iter::once(header).chain(body).enumerate() {
        let row_num = i + 1;
        xml.push_str(&format!("<row r=\"{}\">", row_num));
        for (col, v) in cells.iter().enumerate() {
            let reference = format!("{}{}", column_name(col), row_num);
            xml.push_str(&cell_xml(&reference, v.as_ref()));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
</Types>";

const ROOT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>";

const WORKBOOK: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
<sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>";

const WORKBOOK_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
</Relationships>";

fn render_xlsx(fields: &[String], rows: &[Value]) -> Result<Vec<u8>, AppError> {
    let sheet = sheet_xml(fields, rows);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ] {
        zip.start_file(name, options)
            .map_err(|e| AppError::Export(format!("xlsx {}: {}", name, e)))?;
        zip.write_all(body.as_bytes())
            .map_err(|e| AppError::Export(format!("xlsx {}: {}", name, e)))?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| AppError::Export(format!("xlsx: {}", e)))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, EntityConfig, FieldConfig, KernelConfig};
    use serde_json::json;
    use std::io::Read;

    fn fields() -> Vec<String> {
        vec!["id".into(), "name".into(), "note".into()]
    }

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "kilo, gram", "note": null}),
            json!({"id": 2, "name": "<litre>", "note": "a\"b"}),
        ]
    }

    #[test]
    fn format_is_chosen_by_substring() {
        assert_eq!(ExportFormat::from_param(None), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_param(Some("xlsx")), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_param(Some("as-xlsx")), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_param(Some("pdf")), ExportFormat::Csv);
        assert_eq!(ExportFormat::Xlsx.content_type(), "application/vnd.ms-excel");
    }

    #[test]
    fn csv_quotes_and_blanks() {
        let out = String::from_utf8(ExportFormat::Csv.render(&fields(), &rows()).unwrap()).unwrap();
        assert_eq!(out, "id,name,note\n1,\"kilo, gram\",\n2,<litre>,\"a\"\"b\"\n");
    }

    #[test]
    fn xlsx_is_a_zip_with_the_sheet() {
        let bytes = ExportFormat::Xlsx.render(&fields(), &rows()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains("<c r=\"A2\"><v>1</v></c>"));
        assert!(sheet.contains("&lt;litre&gt;"));
        assert!(sheet.contains("<row r=\"3\">"));
    }

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27 * 26), "AAA");
    }

    #[test]
    fn filename_and_fields() {
        let mut e = EntityConfig::new("KernelUnit", "catalog").field(FieldConfig::char("name", 10));
        e.export = true;
        e.export_fields = Some(vec!["name".into()]);
        let model = resolve(&KernelConfig { entities: vec![e] }, "kernel").unwrap();
        let unit = &model.entities[0];
        assert_eq!(export_filename(unit, ExportFormat::Xlsx), "kernel-unit.xlsx");
        assert_eq!(export_fields(unit), ["name"]);
    }
}
