//! Countrysrv - cached read API over a local mirror of the REST Countries dataset
//!
//! This library provides the store adapter, the cache-aside layer, the
//! dataset refresher and the query orchestrator behind the HTTP routes.

pub mod api;
pub mod cli;
pub mod config;
pub mod initialization;
pub mod models;
pub mod services;

use crate::services::{cache::ResponseCache, country::CountryService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub country_service: Arc<CountryService>,
    pub cache: ResponseCache,
}
