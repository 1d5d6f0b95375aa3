pub mod auth;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod routes;

pub use routes::router;
