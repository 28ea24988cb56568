//! Status rendering: per-service templates and the do-not-post filter.

pub mod filters;
pub mod templates;

pub use filters::do_not_post;
pub use templates::{
    new_case_template, template_for_channel, StatusTemplate, TemplateFields, TextImage,
};
