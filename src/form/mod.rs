//! Form handling
//!
//! Decoding of submitted bodies, schema validation, CSRF protection and the
//! view handed to templates.

pub mod csrf;
pub mod parse;
pub mod schema;
pub mod view;

pub use csrf::{CsrfGuard, CSRF_FIELD};
pub use parse::{read_form, FormError};
pub use schema::{FieldErrors, FormData, Submission};
pub use view::FormView;
