//! Сборка счетов из плоских строк продаж: группировка, позиции, знак, обогащение справочником.

use chrono::NaiveDate;
use contracts::domain::a003_invoice::aggregate::{CREDIT_NOTE_SIGN, SALE_SIGN};
use std::collections::{HashMap, HashSet};

use super::field_resolver::FieldIndex;
use super::identity::{normalize_customer_id, normalize_refer};
use super::mappers::{CITY_FIELDS, INVOICE_NUMBER_FIELDS, NIT_FIELDS, VENDOR_FIELDS};
use super::record_extractor::FlatRecord;
use super::source_models::{FetchedInvoices, InvoiceDraft, InvoiceItemDraft};
use crate::projections::p901_inventory_directory::service::BrandDirectory;

const ISSUED_AT_FIELDS: &[&str] = &["fecha", "fechafactura", "fechadocumento", "issued_at", "issuedat", "date"];
const HEADER_TOTAL_FIELDS: &[&str] = &["totalfactura", "valorfactura", "total_factura", "invoice_total"];
const HEADER_MARGIN_FIELDS: &[&str] = &["margenfactura", "utilidadfactura", "invoice_margin"];
const HEADER_UNITS_FIELDS: &[&str] = &["unidadesfactura", "totalunidades", "invoice_units"];
const LINE_TOTAL_FIELDS: &[&str] = &["total", "valortotal", "subtotal", "valor", "venta", "line_total"];
const LINE_MARGIN_FIELDS: &[&str] = &["margen", "utilidad", "margin"];
const QUANTITY_FIELDS: &[&str] = &["cantidad", "unidades", "quantity", "qty", "units"];
const UNIT_PRICE_FIELDS: &[&str] = &["preciounitario", "valorunitario", "precio", "unit_price", "unitprice"];
const REFERENCE_FIELDS: &[&str] = &["referencia", "refer", "codigoproducto", "reference", "sku"];
const PRODUCT_NAME_FIELDS: &[&str] = &["descripcion", "nombreproducto", "producto", "detalle", "product_name", "productname"];
const BRAND_FIELDS: &[&str] = &["nombremarca", "marca", "brand"];
const BRAND_CODE_FIELDS: &[&str] = &["codmarca", "codigomarca", "brand_code", "brandcode"];
const CATEGORY_FIELDS: &[&str] = &["categoria", "linea", "grupo", "category"];
const CLASS_CODE_FIELDS: &[&str] = &["codclase", "codigoclase", "clase", "class_code", "classcode"];
const CLASS_NAME_FIELDS: &[&str] = &["nombreclase", "descclase", "class_name", "classname"];
const DOCUMENT_TYPE_FIELDS: &[&str] = &["tipodocumento", "tipodoc", "tipo", "prefijo", "document_type", "documenttype"];
const SIGN_FIELDS: &[&str] = &["signo", "salesign", "sale_sign", "sign"];

/// Собрать счета из строк продаж.
///
/// Строки группируются по внешнему номеру документа (в пределах клиента), а без номера
/// по синтетическому ключу (клиент, дата, сумма). Черновики без NIT клиента отбрасываются.
pub fn map_invoices(
    records: &[FlatRecord],
    fallback_date: NaiveDate,
    directory: &BrandDirectory,
) -> FetchedInvoices {
    let mut drafts: Vec<InvoiceDraft> = Vec::new();
    // Знак задан источником явно (поле знака или тип документа)
    let mut sign_marked: Vec<bool> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unmapped: HashSet<String> = HashSet::new();

    for record in records {
        let idx = FieldIndex::new(record);

        let raw_nit = idx.pick_string(NIT_FIELDS).unwrap_or_default();
        let nit = normalize_customer_id(&raw_nit);
        if nit.is_empty() {
            continue;
        }

        let external_id = idx.pick_string(INVOICE_NUMBER_FIELDS);
        let issued_at = idx.pick_date(ISSUED_AT_FIELDS).unwrap_or(fallback_date);
        let header_total = idx.pick_number(HEADER_TOTAL_FIELDS);
        let line_total = idx.pick_number(LINE_TOTAL_FIELDS).unwrap_or(0.0);

        let key = match &external_id {
            Some(id) => format!("{}|{}", nit, id),
            None => format!(
                "{}|{}|{:.2}",
                nit,
                issued_at,
                header_total.unwrap_or(line_total)
            ),
        };

        let pos = *position.entry(key).or_insert_with(|| {
            drafts.push(new_draft(&idx, raw_nit.clone(), external_id.clone(), issued_at));
            sign_marked.push(false);
            drafts.len() - 1
        });
        let draft = &mut drafts[pos];

        if let Some(item) = map_item(&idx, line_total, directory, &mut unmapped) {
            draft.items.push(item);
        }

        // Заголовочные значения берём из первой строки, где они есть
        if draft.total == 0.0 {
            draft.total = header_total.unwrap_or(0.0);
        }
        if draft.margin == 0.0 {
            draft.margin = idx.pick_number(HEADER_MARGIN_FIELDS).unwrap_or(0.0);
        }
        if draft.units == 0.0 {
            draft.units = idx.pick_number(HEADER_UNITS_FIELDS).unwrap_or(0.0);
        }
        // Пометка кредит-ноты на любой строке побеждает
        if let Some(sign) = detect_sign(&idx) {
            if !sign_marked[pos] || sign == CREDIT_NOTE_SIGN {
                draft.sale_sign = sign;
            }
            sign_marked[pos] = true;
        }
    }

    for (draft, marked) in drafts.iter_mut().zip(sign_marked) {
        finalize(draft, marked);
    }

    FetchedInvoices {
        invoices: drafts,
        unmapped_refs_count: unmapped.len(),
    }
}

fn new_draft(
    idx: &FieldIndex<'_>,
    customer_nit: String,
    external_id: Option<String>,
    issued_at: NaiveDate,
) -> InvoiceDraft {
    InvoiceDraft {
        external_id,
        customer_nit,
        issued_at,
        total: 0.0,
        margin: 0.0,
        units: 0.0,
        sale_sign: SALE_SIGN,
        vendor: idx.pick_string(VENDOR_FIELDS),
        city: idx.pick_string(CITY_FIELDS),
        document_type: idx.pick_string(DOCUMENT_TYPE_FIELDS),
        items: Vec::new(),
    }
}

fn map_item(
    idx: &FieldIndex<'_>,
    total: f64,
    directory: &BrandDirectory,
    unmapped: &mut HashSet<String>,
) -> Option<InvoiceItemDraft> {
    let reference = idx
        .pick(REFERENCE_FIELDS)
        .map(normalize_refer)
        .filter(|r| !r.is_empty());
    let product_name = idx.pick_string(PRODUCT_NAME_FIELDS);
    let quantity = idx.pick_number(QUANTITY_FIELDS).unwrap_or(0.0);

    // Строка-заголовок без товара
    if reference.is_none() && product_name.is_none() && quantity == 0.0 && total == 0.0 {
        return None;
    }

    let unit_price = idx
        .pick_number(UNIT_PRICE_FIELDS)
        .unwrap_or(if quantity != 0.0 { total / quantity } else { 0.0 });

    let mut item = InvoiceItemDraft {
        product_name: product_name
            .or_else(|| reference.clone())
            .unwrap_or_default(),
        brand: idx.pick_string(BRAND_FIELDS),
        brand_code: idx.pick_string(BRAND_CODE_FIELDS),
        category: idx.pick_string(CATEGORY_FIELDS),
        class_code: idx.pick_string(CLASS_CODE_FIELDS),
        class_name: idx.pick_string(CLASS_NAME_FIELDS),
        quantity,
        unit_price,
        total,
        margin: idx.pick_number(LINE_MARGIN_FIELDS).unwrap_or(0.0),
        reference: reference.clone(),
    };

    if let Some(reference) = reference {
        match directory.lookup(&reference) {
            Some(entry) => {
                // Марка из справочника важнее текста ERP
                if entry.brand.is_some() {
                    item.brand = entry.brand.clone();
                }
                item.brand_code = item.brand_code.or_else(|| entry.brand_code.clone());
                item.class_code = item.class_code.or_else(|| entry.class_code.clone());
                item.class_name = item.class_name.or_else(|| entry.class_name.clone());
            }
            None => {
                unmapped.insert(reference);
            }
        }
    }

    Some(item)
}

/// Знак, заданный строкой явно: поле знака, затем тип документа.
/// Отрицательная сумма строки (скидка, возврат позиции) знак не задаёт.
fn detect_sign(idx: &FieldIndex<'_>) -> Option<i32> {
    if let Some(sign) = idx.pick_number(SIGN_FIELDS) {
        return Some(if sign < 0.0 { CREDIT_NOTE_SIGN } else { SALE_SIGN });
    }
    idx.pick(DOCUMENT_TYPE_FIELDS)
        .filter(|doc_type| is_credit_note_type(doc_type))
        .map(|_| CREDIT_NOTE_SIGN)
}

fn is_credit_note_type(doc_type: &str) -> bool {
    let upper = doc_type.to_uppercase();
    upper.contains("NOTA CREDITO")
        || upper.contains("NOTA CRÉDITO")
        || upper.contains("DEVOLUCION")
        || upper.contains("DEVOLUCIÓN")
        || upper.contains("CREDIT")
        || upper
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| matches!(token, "NC" | "DEV"))
}

fn finalize(draft: &mut InvoiceDraft, sign_marked: bool) {
    let items_total: f64 = draft.items.iter().map(|i| i.total).sum();
    let items_margin: f64 = draft.items.iter().map(|i| i.margin).sum();
    let items_units: f64 = draft.items.iter().map(|i| i.quantity).sum();

    // Заголовок побеждает, если задан и не нулевой
    if draft.total == 0.0 {
        draft.total = items_total;
    }
    if draft.margin == 0.0 {
        draft.margin = items_margin;
    }
    if draft.units == 0.0 {
        draft.units = items_units;
    }

    // Без явной пометки кредит-нотой считается только документ с отрицательной суммой
    if !sign_marked && draft.total < 0.0 {
        draft.sale_sign = CREDIT_NOTE_SIGN;
    }

    // Кредит-нота с уже отрицательными суммами: храним сырые значения положительными
    if draft.sale_sign == CREDIT_NOTE_SIGN && draft.total < 0.0 {
        draft.total = -draft.total;
        draft.margin = -draft.margin;
        draft.units = -draft.units;
        for item in &mut draft.items {
            item.total = -item.total;
            item.margin = -item.margin;
            item.quantity = -item.quantity;
            item.unit_price = item.unit_price.abs();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::projections::p901_inventory_directory::DirectoryEntry;

    fn rec(pairs: &[(&str, &str)]) -> FlatRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    #[test]
    fn test_lines_grouped_by_invoice_number() {
        let records = vec![
            rec(&[("Nit", "900.1-K"), ("Factura", "F1"), ("Referencia", "R1"), ("Cantidad", "2"), ("Total", "600")]),
            rec(&[("Nit", "9001k"), ("Factura", "F1"), ("Referencia", "R2"), ("Cantidad", "1"), ("Total", "400")]),
            rec(&[("Nit", "800"), ("Factura", "F1"), ("Referencia", "R1"), ("Cantidad", "1"), ("Total", "50")]),
        ];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        assert_eq!(fetched.invoices.len(), 2);

        let f1 = &fetched.invoices[0];
        assert_eq!(f1.external_id.as_deref(), Some("F1"));
        assert_eq!(f1.items.len(), 2);
        assert_eq!(f1.total, 1000.0);
        assert_eq!(f1.units, 3.0);
        assert_eq!(f1.items[0].unit_price, 300.0);
        assert_eq!(f1.issued_at, day());
        assert_eq!(fetched.unmapped_refs_count, 2);
    }

    #[test]
    fn test_header_total_wins_when_present() {
        let records = vec![
            rec(&[("nit", "1"), ("factura", "F9"), ("totalfactura", "1190"), ("total", "1000"), ("descripcion", "X")]),
        ];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        assert_eq!(fetched.invoices[0].total, 1190.0);
        assert_eq!(fetched.invoices[0].items[0].total, 1000.0);
    }

    #[test]
    fn test_synthesized_key_without_invoice_number() {
        let records = vec![
            rec(&[("nit", "1"), ("fecha", "2024-01-02"), ("totalfactura", "100"), ("total", "60"), ("descripcion", "A")]),
            rec(&[("nit", "1"), ("fecha", "2024-01-02"), ("totalfactura", "100"), ("total", "40"), ("descripcion", "B")]),
            rec(&[("nit", "1"), ("fecha", "2024-01-03"), ("totalfactura", "100"), ("total", "100"), ("descripcion", "C")]),
        ];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        assert_eq!(fetched.invoices.len(), 2);
        assert!(fetched.invoices[0].external_id.is_none());
        assert_eq!(fetched.invoices[0].items.len(), 2);
    }

    #[test]
    fn test_credit_note_sign_and_absolute_raw_values() {
        let records = vec![
            rec(&[("nit", "1"), ("factura", "NC-7"), ("tipodocumento", "NC"), ("total", "-100"), ("cantidad", "-2")]),
            rec(&[("nit", "2"), ("factura", "D-1"), ("signo", "-1"), ("total", "100"), ("cantidad", "2")]),
        ];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        assert_eq!(fetched.invoices.len(), 2);
        for draft in &fetched.invoices {
            assert_eq!(draft.sale_sign, CREDIT_NOTE_SIGN);
            assert_eq!(draft.total, 100.0);
            assert_eq!(draft.units, 2.0);
            assert_eq!(draft.items[0].quantity, 2.0);
            assert_eq!(draft.items[0].total, 100.0);
            assert_eq!(draft.items[0].unit_price, 50.0);
        }
    }

    #[test]
    fn test_discount_line_does_not_turn_sale_into_credit_note() {
        let records = vec![
            rec(&[("nit", "1"), ("factura", "F1"), ("descripcion", "X"), ("cantidad", "1"), ("total", "1000")]),
            rec(&[("nit", "1"), ("factura", "F1"), ("descripcion", "Descuento"), ("cantidad", "1"), ("total", "-50")]),
        ];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        let draft = &fetched.invoices[0];
        assert_eq!(draft.sale_sign, SALE_SIGN);
        assert_eq!(draft.total, 950.0);
        assert_eq!(draft.items[1].total, -50.0);
    }

    #[test]
    fn test_unmarked_document_netting_negative_is_credit_note() {
        let records = vec![
            rec(&[("nit", "1"), ("factura", "R-3"), ("descripcion", "X"), ("cantidad", "-1"), ("total", "-80")]),
        ];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        let draft = &fetched.invoices[0];
        assert_eq!(draft.sale_sign, CREDIT_NOTE_SIGN);
        assert_eq!(draft.total, 80.0);
        assert_eq!(draft.items[0].unit_price, 80.0);
    }

    #[test]
    fn test_explicit_positive_sign_keeps_sale_even_when_negative() {
        let records = vec![
            rec(&[("nit", "1"), ("factura", "A-1"), ("signo", "1"), ("descripcion", "Ajuste"), ("total", "-20")]),
        ];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        assert_eq!(fetched.invoices[0].sale_sign, SALE_SIGN);
        assert_eq!(fetched.invoices[0].total, -20.0);
    }

    #[test]
    fn test_directory_brand_preferred_over_erp_text() {
        let directory = BrandDirectory::from_entries(vec![DirectoryEntry {
            reference: "REF 001".into(),
            brand_code: Some("AC".into()),
            brand: Some("Acme".into()),
            class_code: Some("T1".into()),
            class_name: Some("Tornillos".into()),
        }]);
        let records = vec![rec(&[
            ("nit", "1"),
            ("factura", "F1"),
            ("referencia", " ref  001 "),
            ("marca", "ACME SAS (erp)"),
            ("total", "10"),
        ])];
        let fetched = map_invoices(&records, day(), &directory);
        let item = &fetched.invoices[0].items[0];
        assert_eq!(item.reference.as_deref(), Some("REF 001"));
        assert_eq!(item.brand.as_deref(), Some("Acme"));
        assert_eq!(item.class_name.as_deref(), Some("Tornillos"));
        assert_eq!(fetched.unmapped_refs_count, 0);
    }

    #[test]
    fn test_records_without_customer_are_discarded() {
        let records = vec![rec(&[("factura", "F1"), ("total", "10")]), rec(&[("nit", " - "), ("total", "5")])];
        let fetched = map_invoices(&records, day(), &BrandDirectory::default());
        assert!(fetched.invoices.is_empty());
    }
}
