pub mod paths;
pub mod platform;
pub mod regex_cache;
pub mod sanitize;
