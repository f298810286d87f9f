pub mod http;
pub mod traits;

pub use http::HttpImageApi;
pub use traits::ImageApi;
