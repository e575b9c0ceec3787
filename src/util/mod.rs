pub mod text;

pub use text::{collapse_whitespace, normalize_text_field, preview, slugify};
