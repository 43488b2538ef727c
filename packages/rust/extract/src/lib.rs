//! Normalization and field extraction.
//!
//! - [`normalize`]: comparison keys for names, date parsing into a start date
//!   plus verbatim range text
//! - [`fields`]: deadline / conference-date / location extractors driven by
//!   the pattern tables in `patterns`
//! - [`text`]: HTML page body to plain text

pub mod fields;
pub mod normalize;
mod patterns;
pub mod text;

pub use fields::{
    Extracted, extract_conference_dates, extract_deadline, extract_fields, extract_location,
};
pub use normalize::{
    DateContext, NormalizedDate, is_vague_start, month_number, normalize_date, normalize_name,
    significant_tokens,
};
pub use text::{page_text, page_title};
