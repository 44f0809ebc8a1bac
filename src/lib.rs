pub mod error;
pub mod net;
pub mod proto;
pub mod sim;
pub mod telemetry;

#[cfg(test)]
mod test;
