pub mod catalog;
pub mod costing;
pub mod error;
pub mod models;
pub mod pricing;
pub mod remote;
pub mod service;
pub mod sync;
