// Ledger and allocation
pub mod fulfillment;
pub mod stock_ledger;

// Receipt, issue, and correction flows
pub mod adjustment;
pub mod inbound;
pub mod outbound;
pub mod purchase_orders;

// Policy components
pub mod admission;
pub mod approval;

// Infrastructure-flavoured services
pub mod sequencer;
pub mod settings;
