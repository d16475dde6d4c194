pub mod config;
pub mod envelope;
pub mod error;
pub mod types;

pub use config::SdkConfig;
pub use envelope::Envelope;
pub use error::{FlowError, FlowResult};
pub use types::{Campaign, ConversionAnchor, PurchaseOutcome};
