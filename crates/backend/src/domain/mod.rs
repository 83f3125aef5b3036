pub mod a001_tenant;
pub mod a002_customer;
pub mod a003_invoice;
pub mod a004_payment;
pub mod a005_credit;
