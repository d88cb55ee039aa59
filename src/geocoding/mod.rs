pub mod client;
pub mod resolver;

pub use client::{build_geocoder, Geocoder, MapboxGeocoder, UnavailableGeocoder};
pub use resolver::{PlaceResolver, ResolveSummary};
