pub mod params;
pub mod pattern;
pub mod schema;

pub use params::{ParamDef, Params};
pub use pattern::{PageObject, Strategies};
pub use schema::{LocatorConfig, ResolverConfig, UrlPattern};
