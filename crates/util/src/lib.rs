pub mod path_processing;
pub mod text_processing;

pub use path_processing::{expand_tilde, strip_vault_prefix};
pub use text_processing::truncate_for_summary;
