pub mod annotation;
pub mod config;
pub mod engine;
pub mod remote;
pub mod rpc;
pub mod tools;

#[cfg(test)]
mod test_support;
