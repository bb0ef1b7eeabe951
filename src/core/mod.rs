pub mod analytics;
pub mod breaker;
pub mod currency;
pub mod errors;
pub mod floors;
pub mod models;
pub mod observability;
pub mod privacy;
pub mod registry;
pub mod selection;
pub mod spec;
pub mod store;
pub mod validation;
