pub mod types;

pub use types::MarketingRecord;
