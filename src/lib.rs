// Library for tests to access modules

pub mod agent_repo;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod ingestor;
pub mod metrics_repo;
pub mod models;
pub mod query;
pub mod rollup_worker;
pub mod routes;
pub mod service_repo;
pub mod version;
