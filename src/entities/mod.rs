pub mod app_setting;
pub mod drug;
pub mod inbound_receipt;
pub mod outbound_application;
pub mod outbound_application_line;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod stock_adjustment;
pub mod stock_batch;
