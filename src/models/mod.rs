pub mod price_sample;

pub use price_sample::{LiveSample, PriceSample, SampleTable, round_price};
