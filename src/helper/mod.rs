pub mod form_helpers;
pub mod media_helpers;
pub mod pagination;
pub mod posts_helpers;
pub mod render_helpers;
