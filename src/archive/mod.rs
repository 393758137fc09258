pub mod audit;
pub mod config;
pub mod fetch;
pub mod filter;
pub mod index;
pub mod lock;
pub mod partition;
pub mod paths;
pub mod rate_limit;
pub mod store;
pub mod sync;
pub mod util;
pub mod verify;
pub mod warn;
