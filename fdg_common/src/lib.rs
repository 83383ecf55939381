mod helpers;
mod money;
pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{MoneyCents, MoneyConversionError, BASIS_POINTS_DENOMINATOR};
pub use secret::Secret;
