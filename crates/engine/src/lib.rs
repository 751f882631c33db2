pub mod client;
pub mod credentials;
pub mod types;

pub use client::{EngineApi, EngineClient};
pub use credentials::{CredentialProvider, MetadataIdentityTokenProvider, StaticTokenProvider};
pub use types::{
    ActivationRequest, ActivationResponse, AdditionalContent, EngineRequest, EngineResponse,
    ImageRequest, ImageResponse, StockInfo, StockTimestamp,
};
