//! Venue identity, market-data types, and per-venue capabilities.

pub mod capability;
pub mod mock;
pub mod types;

pub use capability::{OrderExecution, OrderSide, PriceFeed, VenueHandle, VenueTable};
pub use mock::{MockCall, MockVenue, MockVenueConfig};
pub use types::{normalize_symbol, TickerPrice, Venue};
