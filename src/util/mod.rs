pub mod data_url;
pub mod rgb_conversion;
