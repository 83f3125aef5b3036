use anyhow::Result;
use contracts::domain::a001_tenant::aggregate::TenantId;
use contracts::domain::a003_invoice::aggregate::{Invoice, InvoiceId, InvoiceItem};
use contracts::domain::common::EntityMetadata;
use uuid::Uuid;

use super::super::source_models::{InvoiceDraft, InvoiceItemDraft};
use super::customer::resolve_or_create_customer;
use crate::projections::p901_inventory_directory::service::CodeNameMap;
use crate::shared::data::storage::SyncStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceOutcome {
    pub created: bool,
    pub customer_created: bool,
    pub items_written: usize,
}

/// Сверить один черновик счёта с хранилищем.
///
/// `None`: черновик не сверяется (нет NIT или внешнего номера), это не ошибка.
/// Позиции счёта всегда заменяются целиком.
pub async fn upsert_invoice(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    draft: &InvoiceDraft,
    code_names: &CodeNameMap,
) -> Result<Option<InvoiceOutcome>> {
    let Some(invoice_number) = draft
        .external_id
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    else {
        return Ok(None);
    };

    let Some(resolved) = resolve_or_create_customer(store, tenant_id, &draft.customer_nit).await? else {
        return Ok(None);
    };
    let mut customer = resolved.customer;

    // Город клиента: первый увиденный побеждает
    if customer.backfill_city(draft.city.as_deref()) {
        store.update_customer(&customer).await?;
    }

    let existing = store
        .find_invoice(tenant_id, customer.id, invoice_number)
        .await?;
    let created = existing.is_none();

    let mut invoice = match existing {
        Some(mut invoice) => {
            invoice.issued_at = draft.issued_at;
            invoice.total = draft.total;
            invoice.margin = draft.margin;
            invoice.units = draft.units;
            invoice.sale_sign = draft.sale_sign;
            invoice.vendor = draft.vendor.clone();
            invoice.city = draft.city.clone();
            invoice.document_type = draft.document_type.clone();
            invoice.metadata.touch();
            invoice
        }
        None => Invoice {
            id: InvoiceId::new_v4(),
            tenant_id,
            customer_id: customer.id,
            invoice_number: invoice_number.to_string(),
            issued_at: draft.issued_at,
            total: draft.total,
            margin: draft.margin,
            units: draft.units,
            sale_sign: draft.sale_sign,
            signed_total: 0.0,
            signed_margin: 0.0,
            signed_units: 0.0,
            vendor: draft.vendor.clone(),
            city: draft.city.clone(),
            document_type: draft.document_type.clone(),
            metadata: EntityMetadata::new(),
        },
    };
    invoice.apply_sign();

    if created {
        store.insert_invoice(&invoice).await?;
    } else {
        store.update_invoice(&invoice).await?;
    }

    let items: Vec<InvoiceItem> = draft
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| to_invoice_item(invoice.id, idx, item, code_names))
        .collect();
    store.replace_invoice_items(invoice.id, &items).await?;

    Ok(Some(InvoiceOutcome {
        created,
        customer_created: resolved.created,
        items_written: items.len(),
    }))
}

fn to_invoice_item(
    invoice_id: InvoiceId,
    idx: usize,
    item: &InvoiceItemDraft,
    code_names: &CodeNameMap,
) -> InvoiceItem {
    // Наименование из строки важнее перевода кода
    let brand = item.brand.clone().or_else(|| {
        item.brand_code
            .as_deref()
            .and_then(|code| code_names.brand_name(code))
            .map(str::to_string)
    });
    let class_name = item.class_name.clone().or_else(|| {
        item.class_code
            .as_deref()
            .and_then(|code| code_names.class_name(code))
            .map(str::to_string)
    });

    InvoiceItem {
        id: Uuid::new_v4(),
        invoice_id,
        line_no: idx as i32 + 1,
        reference: item.reference.clone(),
        product_name: item.product_name.clone(),
        brand,
        category: item.category.clone(),
        class_code: item.class_code.clone(),
        class_name,
        quantity: item.quantity,
        unit_price: item.unit_price,
        total: item.total,
        margin: item.margin,
    }
}
