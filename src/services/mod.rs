pub mod geocoder;
pub mod image_store;
pub mod place_service;

pub use geocoder::{FixedGeocoder, GeocodeError, Geocoder, GoogleGeocoder};
pub use image_store::{ImageError, ImageStore, ImageUpload, LocalImageStore};
pub use place_service::{PlaceError, PlaceInput, PlaceService, PlaceUpdate};
