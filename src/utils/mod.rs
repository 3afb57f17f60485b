pub mod retry;
pub mod validation;

pub use validation::{validate_font_size, validate_source_url};
