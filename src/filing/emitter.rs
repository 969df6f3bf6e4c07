use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

use super::schema::{RowStyle, SchemaDescriptor};
use super::{FilingDocument, FilingHeader, FilingRow, RowEntry, SecurityItem, Taxpayer};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Serialize a filing as indented UTF-8 XML
pub fn emit(document: &FilingDocument, schema: &SchemaDescriptor) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new(schema.root);
    for (name, value) in schema.namespaces {
        root.push_attribute((*name, *value));
    }
    writer.write_event(Event::Start(root))?;

    write_header(&mut writer, &document.header.fields.taxpayer)?;
    empty(&mut writer, "edp:AttachmentList")?;
    empty(&mut writer, "edp:Signatures")?;

    start(&mut writer, "body")?;
    empty(&mut writer, "edp:bodyContent")?;
    start(&mut writer, "Doh_KDVP")?;
    write_kdvp(&mut writer, &document.header)?;
    for item in &document.items {
        write_item(&mut writer, item, schema)?;
    }
    end(&mut writer, "Doh_KDVP")?;
    end(&mut writer, "body")?;

    end(&mut writer, schema.root)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write the finished document in one go
pub fn write_document(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} bytes to {:?}", bytes.len(), path);
    Ok(())
}

fn write_header<W: Write>(w: &mut Writer<W>, taxpayer: &Taxpayer) -> Result<()> {
    start(w, "edp:Header")?;
    start(w, "edp:taxpayer")?;
    text(w, "edp:taxNumber", &taxpayer.tax_number)?;
    text(w, "edp:taxpayerType", Taxpayer::TAXPAYER_TYPE)?;
    text(w, "edp:name", &taxpayer.name)?;
    text(w, "edp:address1", &taxpayer.address)?;
    text(w, "edp:city", &taxpayer.city)?;
    text(w, "edp:postNumber", &taxpayer.post_number)?;
    text(
        w,
        "edp:birthDate",
        &taxpayer.birth_date.format(DATE_FORMAT).to_string(),
    )?;
    end(w, "edp:taxpayer")?;
    end(w, "edp:Header")
}

fn write_kdvp<W: Write>(w: &mut Writer<W>, header: &FilingHeader) -> Result<()> {
    let fields = &header.fields;
    start(w, "KDVP")?;
    text(w, "DocumentWorkflowID", fields.workflow.code())?;
    text(w, "Year", &fields.period.year.to_string())?;
    text(w, "PeriodStart", &fields.period.start.format(DATE_FORMAT).to_string())?;
    text(w, "PeriodEnd", &fields.period.end.format(DATE_FORMAT).to_string())?;
    text(w, "IsResident", bool_str(fields.is_resident))?;
    text(w, "TelephoneNumber", &fields.taxpayer.phone)?;
    text(w, "SecurityCount", &header.security_count.to_string())?;
    text(w, "SecurityShortCount", &header.security_short_count.to_string())?;
    text(
        w,
        "SecurityWithContractCount",
        &header.security_with_contract_count.to_string(),
    )?;
    text(
        w,
        "SecurityWithContractShortCount",
        &header.security_with_contract_short_count.to_string(),
    )?;
    text(w, "ShareCount", &header.share_count.to_string())?;
    text(w, "Email", &fields.taxpayer.email)?;
    end(w, "KDVP")
}

fn write_item<W: Write>(
    w: &mut Writer<W>,
    item: &SecurityItem,
    schema: &SchemaDescriptor,
) -> Result<()> {
    start(w, "KDVPItem")?;
    text(w, "InventoryListType", "PLVP")?;
    text(w, "Name", &item.ticker)?;
    text(w, "HasForeignTax", "false")?;
    text(w, "HasLossTransfer", "true")?;
    text(w, "ForeignTransfer", "false")?;
    text(w, "TaxDecreaseConformance", "false")?;

    start(w, "Securities")?;
    if schema.requires_isin {
        text(w, "ISIN", item.isin.as_deref().unwrap_or(super::MISSING_ISIN))?;
    }
    text(w, "Code", &item.ticker)?;
    text(w, "IsFond", "false")?;
    for row in &item.rows {
        write_row(w, row, schema)?;
    }
    end(w, "Securities")?;

    end(w, "KDVPItem")
}

fn write_row<W: Write>(w: &mut Writer<W>, row: &FilingRow, schema: &SchemaDescriptor) -> Result<()> {
    start(w, "Row")?;
    text(w, "ID", &row.id.to_string())?;

    let (name, fields) = entry_fields(&row.entry, schema);
    match schema.row_style {
        RowStyle::Elements => {
            start(w, name)?;
            for (field, value) in &fields {
                text(w, field, value)?;
            }
            end(w, name)?;
        }
        RowStyle::Attributes => {
            let mut element = BytesStart::new(name);
            for (field, value) in &fields {
                element.push_attribute((*field, value.as_str()));
            }
            w.write_event(Event::Empty(element))?;
        }
    }

    end(w, "Row")
}

/// Element name and ordered (field, value) pairs of a row entry
fn entry_fields(
    entry: &RowEntry,
    schema: &SchemaDescriptor,
) -> (&'static str, Vec<(&'static str, String)>) {
    match entry {
        RowEntry::Purchase {
            date,
            method,
            quantity,
            price_eur,
        } => {
            let f = &schema.purchase;
            (
                "Purchase",
                vec![
                    (f.date, date.format(DATE_FORMAT).to_string()),
                    (f.method, method.code().to_string()),
                    (f.quantity, quantity.to_string()),
                    (f.price, price_eur.to_string()),
                ],
            )
        }
        RowEntry::Sale {
            date,
            quantity,
            price_eur,
            loss_rule,
        } => {
            let f = &schema.sale;
            (
                "Sale",
                vec![
                    (f.date, date.format(DATE_FORMAT).to_string()),
                    (f.quantity, quantity.to_string()),
                    (f.price, price_eur.to_string()),
                    (f.loss_rule, bool_str(*loss_rule).to_string()),
                ],
            )
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn start<W: Write>(w: &mut Writer<W>, name: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end<W: Write>(w: &mut Writer<W>, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty<W: Write>(w: &mut Writer<W>, name: &str) -> Result<()> {
    w.write_event(Event::Empty(BytesStart::new(name)))?;
    Ok(())
}

fn text<W: Write>(w: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    end(w, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filing::schema::{KDVP_8_ATTRIBUTES, KDVP_9, KDVP_9_ISIN};
    use crate::filing::tests::header_fields;
    use crate::filing::{AcquisitionMethod, FilingHeader};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn document(isin: Option<&str>) -> FilingDocument {
        let date = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();
        FilingDocument {
            header: FilingHeader {
                fields: header_fields(),
                security_count: 1,
                security_short_count: 0,
                security_with_contract_count: 0,
                security_with_contract_short_count: 0,
                share_count: 0,
            },
            items: vec![SecurityItem {
                ticker: "XYZ".to_string(),
                isin: isin.map(str::to_string),
                rows: vec![
                    FilingRow {
                        id: 0,
                        entry: RowEntry::Purchase {
                            date,
                            method: AcquisitionMethod::Bought,
                            quantity: dec!(10.0000),
                            price_eur: dec!(85.0000),
                        },
                    },
                    FilingRow {
                        id: 1,
                        entry: RowEntry::Sale {
                            date,
                            quantity: dec!(10.0000),
                            price_eur: dec!(93.5000),
                            loss_rule: true,
                        },
                    },
                ],
            }],
        }
    }

    fn emit_str(doc: &FilingDocument, schema: &SchemaDescriptor) -> String {
        String::from_utf8(emit(doc, schema).unwrap()).unwrap()
    }

    #[test]
    fn test_field_code_layout() {
        let xml = emit_str(&document(None), &KDVP_9);

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(
            "<Envelope xmlns=\"http://edavki.durs.si/Documents/Schemas/Doh_KDVP_9.xsd\" xmlns:edp="
        ));
        assert!(xml.contains("<edp:taxNumber>12345678</edp:taxNumber>"));
        assert!(xml.contains("<edp:birthDate>1990-01-31</edp:birthDate>"));
        assert!(xml.contains("<edp:AttachmentList/>"));
        assert!(xml.contains("<DocumentWorkflowID>O</DocumentWorkflowID>"));
        assert!(xml.contains("<PeriodEnd>2021-12-31</PeriodEnd>"));
        assert!(xml.contains("<SecurityCount>1</SecurityCount>"));
        assert!(xml.contains("<F1>2021-03-05</F1>"));
        assert!(xml.contains("<F2>B</F2>"));
        assert!(xml.contains("<F3>10.0000</F3>"));
        assert!(xml.contains("<F4>85.0000</F4>"));
        assert!(xml.contains("<F9>93.5000</F9>"));
        assert!(xml.contains("<F10>true</F10>"));
        assert!(!xml.contains("<ISIN>"));
    }

    #[test]
    fn test_element_order() {
        let xml = emit_str(&document(None), &KDVP_9);
        let order = [
            "<edp:Header>",
            "<edp:AttachmentList/>",
            "<edp:Signatures/>",
            "<body>",
            "<edp:bodyContent/>",
            "<Doh_KDVP>",
            "<KDVP>",
            "</KDVP>",
            "<KDVPItem>",
            "<Securities>",
            "<Code>XYZ</Code>",
            "<ID>0</ID>",
            "<Purchase>",
            "<ID>1</ID>",
            "<Sale>",
            "</Doh_KDVP>",
            "</Envelope>",
        ];
        let mut cursor = 0;
        for tag in order {
            let found = xml[cursor..]
                .find(tag)
                .unwrap_or_else(|| panic!("{} missing or out of order", tag));
            cursor += found + tag.len();
        }
    }

    #[test]
    fn test_isin_precedes_code() {
        let xml = emit_str(&document(Some("US0000000001")), &KDVP_9_ISIN);
        let isin = xml.find("<ISIN>US0000000001</ISIN>").unwrap();
        let code = xml.find("<Code>XYZ</Code>").unwrap();
        assert!(isin < code);
    }

    #[test]
    fn test_attribute_layout() {
        let xml = emit_str(&document(None), &KDVP_8_ATTRIBUTES);
        assert!(xml.contains("Doh_KDVP_8.xsd"));
        assert!(xml.contains(
            "<Purchase Date=\"2021-03-05\" Type=\"B\" Amount=\"10.0000\" Value=\"85.0000\"/>"
        ));
        assert!(xml.contains(
            "<Sale Date=\"2021-03-05\" Amount=\"10.0000\" Value=\"93.5000\" LossTransfer=\"true\"/>"
        ));
        assert!(xml.contains("<ISIN>ERROR</ISIN>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut doc = document(None);
        doc.header.fields.taxpayer.address = "Trg <A> & B".to_string();
        let xml = emit_str(&doc, &KDVP_9);
        assert!(xml.contains("<edp:address1>Trg &lt;A&gt; &amp; B</edp:address1>"));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let doc = document(None);
        assert_eq!(emit(&doc, &KDVP_9).unwrap(), emit(&doc, &KDVP_9).unwrap());
    }
}
