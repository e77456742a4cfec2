pub mod error_utils;
pub mod export;
pub mod twitter;
