//! HTTP adapters for the Atelier tool seams.
//!
//! - [`HttpRenderService`]: try-on renders through a `/run` + `/status/{id}` API
//! - [`ProductSearchCatalog`]: catalog search through a product search API

pub mod catalog;
pub mod error;
pub mod render;

pub use catalog::{ProductSearchCatalog, ProductSearchConfig, PRODUCT_SEARCH_SOURCE};
pub use error::{RemoteError, RemoteResult};
pub use render::{HttpRenderService, RenderServiceConfig, DEFAULT_MODEL_NAME, DEFAULT_RENDER_URL};

/// User agent sent with every request.
pub const USER_AGENT_VALUE: &str = concat!("atelier/", env!("CARGO_PKG_VERSION"));
