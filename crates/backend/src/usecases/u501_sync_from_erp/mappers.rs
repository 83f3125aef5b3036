//! Маппинг плоских записей ERP в модели Source API.
//! Списки синонимов упорядочены по приоритету.

use contracts::projections::p901_inventory_directory::DirectoryEntry;

use super::field_resolver::FieldIndex;
use super::record_extractor::FlatRecord;
use super::source_models::{CustomerRecord, PaymentRecord};

pub const NIT_FIELDS: &[&str] = &[
    "nit",
    "cedula",
    "documentocliente",
    "idcliente",
    "nitcliente",
    "customer_nit",
    "customernit",
];
pub const CUSTOMER_NAME_FIELDS: &[&str] = &[
    "nombre",
    "nombrecliente",
    "razonsocial",
    "razon_social",
    "customer_name",
    "customername",
    "name",
];
pub const CITY_FIELDS: &[&str] = &["ciudad", "nombreciudad", "municipio", "city"];
pub const VENDOR_FIELDS: &[&str] = &["vendedor", "nombrevendedor", "asesor", "vendor"];
pub const INVOICE_NUMBER_FIELDS: &[&str] = &[
    "factura",
    "numerofactura",
    "numfactura",
    "nrofactura",
    "documento",
    "numdoc",
    "externalid",
    "external_id",
    "invoice_number",
    "invoicenumber",
];

const SEGMENT_FIELDS: &[&str] = &["segmento", "tipocliente", "canal", "segment"];
const CREDIT_LIMIT_FIELDS: &[&str] = &["cupo", "cupocredito", "limitecredito", "credit_limit", "creditlimit"];
const PAID_AT_FIELDS: &[&str] = &["fechapago", "fecha_pago", "fecharecibo", "paid_at", "paidat", "fecha"];
const AMOUNT_FIELDS: &[&str] = &["valorpagado", "valor_pagado", "abono", "valorrecibo", "pago", "amount"];
const BALANCE_FIELDS: &[&str] = &["saldo", "saldofactura", "valorsaldo", "balance"];
const DUE_DATE_FIELDS: &[&str] = &["fechavencimiento", "fecha_vencimiento", "vencimiento", "due_date", "duedate"];
const DAYS_OVERDUE_FIELDS: &[&str] = &["diasvencidos", "dias_vencidos", "diasmora", "days_overdue", "daysoverdue"];

const REFERENCE_FIELDS: &[&str] = &["referencia", "refer", "codigo", "reference", "item"];
const DIR_BRAND_FIELDS: &[&str] = &["nombre marca", "nombremarca", "desmarca", "brand"];
const DIR_BRAND_CODE_FIELDS: &[&str] = &["marca", "codmarca", "brand_code", "brandcode"];
const DIR_CLASS_FIELDS: &[&str] = &["nombre clase", "nombreclase", "desclase", "class_name", "classname"];
const DIR_CLASS_CODE_FIELDS: &[&str] = &["clase", "codclase", "class_code", "classcode"];

/// Клиент из справочника ERP. Запись без NIT отбрасывается.
pub fn to_customer_record(record: &FlatRecord) -> Option<CustomerRecord> {
    let idx = FieldIndex::new(record);
    Some(CustomerRecord {
        nit: idx.pick_string(NIT_FIELDS)?,
        name: idx.pick_string(CUSTOMER_NAME_FIELDS),
        city: idx.pick_string(CITY_FIELDS),
        vendor: idx.pick_string(VENDOR_FIELDS),
        segment: idx.pick_string(SEGMENT_FIELDS),
        credit_limit: idx.pick_number(CREDIT_LIMIT_FIELDS),
    })
}

/// Строка дебиторки / оплаты. Запись без NIT отбрасывается.
pub fn to_payment_record(record: &FlatRecord) -> Option<PaymentRecord> {
    let idx = FieldIndex::new(record);
    Some(PaymentRecord {
        customer_nit: idx.pick_string(NIT_FIELDS)?,
        invoice_number: idx.pick_string(INVOICE_NUMBER_FIELDS),
        paid_at: idx.pick_date(PAID_AT_FIELDS),
        amount: idx.pick_number(AMOUNT_FIELDS).unwrap_or(0.0),
        balance: idx.pick_number(BALANCE_FIELDS).unwrap_or(0.0),
        due_date: idx.pick_date(DUE_DATE_FIELDS),
        days_overdue: idx
            .pick_number(DAYS_OVERDUE_FIELDS)
            .map(|d| d.round() as i64),
        credit_limit: idx.pick_number(CREDIT_LIMIT_FIELDS),
    })
}

/// Запись инвентаря ERP → запись справочника. Без референса отбрасывается.
pub fn to_directory_entry(record: &FlatRecord) -> Option<DirectoryEntry> {
    let idx = FieldIndex::new(record);
    Some(DirectoryEntry {
        reference: idx.pick_string(REFERENCE_FIELDS)?,
        brand_code: idx.pick_string(DIR_BRAND_CODE_FIELDS),
        brand: idx.pick_string(DIR_BRAND_FIELDS),
        class_code: idx.pick_string(DIR_CLASS_CODE_FIELDS),
        class_name: idx.pick_string(DIR_CLASS_FIELDS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(pairs: &[(&str, &str)]) -> FlatRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_customer_record_aliases() {
        let r = rec(&[
            ("CEDULA", "900.1-K"),
            ("RazonSocial", "ACME"),
            ("Ciudad", "Cali"),
            ("CUPO", "1.500.000,00"),
        ]);
        let c = to_customer_record(&r).unwrap();
        assert_eq!(c.nit, "900.1-K");
        assert_eq!(c.name.as_deref(), Some("ACME"));
        assert_eq!(c.city.as_deref(), Some("Cali"));
        assert_eq!(c.credit_limit, Some(1_500_000.0));
    }

    #[test]
    fn test_record_without_nit_is_dropped() {
        assert!(to_customer_record(&rec(&[("nombre", "X")])).is_none());
        assert!(to_payment_record(&rec(&[("nit", "  "), ("saldo", "1")])).is_none());
    }

    #[test]
    fn test_payment_record_balance_and_payment() {
        let r = rec(&[
            ("NITCLIENTE", "9001"),
            ("Factura", "F1"),
            ("FechaPago", "05/01/2024"),
            ("Abono", "200"),
            ("Saldo", "800"),
            ("FechaVencimiento", "2023-12-01"),
            ("DiasVencidos", "35"),
        ]);
        let p = to_payment_record(&r).unwrap();
        assert_eq!(p.invoice_number.as_deref(), Some("F1"));
        assert_eq!(p.paid_at, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(p.amount, 200.0);
        assert_eq!(p.balance, 800.0);
        assert_eq!(p.days_overdue, Some(35));
    }

    #[test]
    fn test_directory_entry_from_inventory_record() {
        let r = rec(&[("REFERENCIA", "R1"), ("MARCA", "AC"), ("NombreMarca", "Acme")]);
        let e = to_directory_entry(&r).unwrap();
        assert_eq!(e.brand_code.as_deref(), Some("AC"));
        assert_eq!(e.brand.as_deref(), Some("Acme"));
    }
}
