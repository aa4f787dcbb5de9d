pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod server;
pub mod translate;

pub use config::{ApiMode, BridgeConfig};
pub use error::{BridgeError, Result};
pub use fetch::{OutboundRequest, ResponsesFetch, ShimBody, ShimResponse};
pub use logging::SharedLogger;
pub use server::{build_router, AppState};
