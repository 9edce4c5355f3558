//! Pharmstock API Library
//!
//! Inventory ledger and fulfillment engine for a pharmaceutical warehouse:
//! per-batch stock tracking, expiry-gated admission of incoming goods,
//! first-expiring-first-out allocation of outbound requests, purchase-order
//! receipt reconciliation, and dual-operator control for special drugs.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use crate::services::{
    adjustment::AdjustmentService,
    fulfillment::FulfillmentAllocator,
    inbound::InboundService,
    outbound::OutboundService,
    purchase_orders::PurchaseOrderService,
    sequencer::{DocumentSequencer, RetryStrategy},
    settings::{DbSettingsProvider, SettingsProvider},
    stock_ledger::StockLedger,
};

/// Container holding one instance of every business service, wired against a
/// shared connection pool and event channel.
#[derive(Clone)]
pub struct AppServices {
    pub stock_ledger: Arc<StockLedger>,
    pub allocator: Arc<FulfillmentAllocator>,
    pub inbound: Arc<InboundService>,
    pub outbound: Arc<OutboundService>,
    pub adjustments: Arc<AdjustmentService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub settings: Arc<DbSettingsProvider>,
}

impl AppServices {
    pub fn build(
        db: Arc<db::DbPool>,
        config: &config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let settings = Arc::new(DbSettingsProvider::new(db.clone(), config));
        let sequencer = DocumentSequencer::new(RetryStrategy::from_config(config));
        let settings_dyn: Arc<dyn SettingsProvider> = settings.clone();

        Self {
            stock_ledger: Arc::new(StockLedger::new(
                db.clone(),
                settings_dyn.clone(),
                Some(event_sender.clone()),
            )),
            allocator: Arc::new(FulfillmentAllocator::new(db.clone())),
            inbound: Arc::new(InboundService::new(
                db.clone(),
                settings_dyn,
                sequencer.clone(),
                Some(event_sender.clone()),
            )),
            outbound: Arc::new(OutboundService::new(
                db.clone(),
                sequencer.clone(),
                Some(event_sender.clone()),
            )),
            adjustments: Arc::new(AdjustmentService::new(
                db.clone(),
                sequencer.clone(),
                Some(event_sender.clone()),
            )),
            purchase_orders: Arc::new(PurchaseOrderService::new(
                db,
                sequencer,
                Some(event_sender),
            )),
            settings,
        }
    }
}

/// Application state shared with the (out-of-scope) transport layer.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = AppServices::build(db.clone(), &config, event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
