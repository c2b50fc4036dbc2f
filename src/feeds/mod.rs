pub mod config;
pub mod error;
pub mod gateway;
pub mod openaq;
#[cfg(test)]
pub(crate) mod testing;
