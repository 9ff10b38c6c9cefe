//! Feature engineering
//!
//! Rolling form indices, track attributes, categorical encoding and scaling.

pub mod encoding;
pub mod form;
pub mod scaling;
pub mod track;

pub use encoding::{encode, EncodedRow, FEATURE_NAMES};
pub use form::FormTracker;
pub use scaling::StandardScaler;
pub use track::{TrackCatalog, TrackInfo};
