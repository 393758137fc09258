pub mod client;
#[cfg(test)]
pub mod fake;
pub mod remote;
