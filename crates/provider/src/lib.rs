mod error;
mod pagination;
mod stripe;
mod traits;

pub use error::ProviderError;
pub use pagination::{Listed, Page, Paginator};
pub use stripe::{Params, StripeClient, StripeConfig, DEFAULT_API_VERSION};
pub use traits::{EventLog, EventPage, EventQuery};
