mod text;

pub use text::{hex_lower, truncate_chars};
