//! One type per bias, each pairing a data provider with a rules generator.

mod environments;
mod health_checks;
mod key_transactions;
mod latest_release;
mod minimum_sample_rate;
mod replay;
mod uniform;

pub use self::environments::*;
pub use self::health_checks::*;
pub use self::key_transactions::*;
pub use self::latest_release::*;
pub use self::minimum_sample_rate::*;
pub use self::replay::*;
pub use self::uniform::*;
