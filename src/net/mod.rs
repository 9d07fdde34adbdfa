pub mod fetch;
pub mod url_safety;

pub use fetch::{BoundedFetcher, FetchError};
pub use url_safety::{is_http_url, validate, SafeUrl, UrlSafetyError};
