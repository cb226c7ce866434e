pub mod discovery;
pub mod mac;
pub mod pool;

#[cfg(test)]
pub(crate) mod fake_gateway;
