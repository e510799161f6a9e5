pub mod deploy;
pub mod platform;
