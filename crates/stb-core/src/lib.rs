//! Core domain + application logic for the shipment tracking bot.
//!
//! This crate is intentionally transport-agnostic. WhatsApp (via the Baileys
//! sidecar) lives behind the ports in [`messaging::port`], implemented in
//! adapter crates.

pub mod audit;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod handler;
pub mod lifecycle;
pub mod logging;
pub mod messaging;
pub mod records;
pub mod resolver;
pub mod supervisor;
pub mod tracking;

pub use errors::{Error, Result};
