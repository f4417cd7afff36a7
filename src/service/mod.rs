pub mod backend;
pub mod hash_service;
pub mod metrics_service;
pub mod parse_service;
pub mod pricing_service;
pub mod status_service;
