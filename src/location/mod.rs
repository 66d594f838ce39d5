pub mod fix;
pub mod geocode;
pub mod provider;
pub mod service;

pub use fix::LocationFix;
pub use geocode::{GeocoderConfig, NominatimGeocoder, ReverseGeocoder};
pub use provider::{
    PositionErrorCode, PositionProvider, PositionRequest, RawPosition, StaticPositionProvider,
};
pub use service::LocationService;
