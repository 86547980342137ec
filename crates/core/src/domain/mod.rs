pub mod cctv_quote;
pub mod page;
