//! Domain models
//!
//! Photo records as persisted by the metadata store, and the view returned to
//! clients once object keys have been resolved to URLs.

pub mod photo;

pub use photo::{NewPhoto, PhotoRecord, PhotoUpdate, PhotoView, VariantMap};
