//! Thin HTTP surface over the relay core: two routes, permissive CORS,
//! JSON envelopes. All scraping logic lives in the `erp-relay` crate.

pub mod cli;
pub mod logging;
pub mod routes;
