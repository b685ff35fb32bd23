pub mod url_validation;
pub use url_validation::{UrlValidationError, is_private_ip, validate_plugin_endpoint};
