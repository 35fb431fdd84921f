//! Leaf types shared by every crate in the colorize payment gateway workspace.
mod gateway;
mod minor_units;

pub mod helpers;
pub mod op;
mod secret;

pub use gateway::{normalize_gateway_state, GatewayOutcome, PaymentObservation};
pub use minor_units::{MinorUnits, MinorUnitsConversionError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
