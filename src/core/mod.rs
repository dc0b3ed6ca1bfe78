pub mod address;
pub mod clock;
pub mod etl;
pub mod geocode_client;
pub mod pipeline;
pub mod reconcile;
pub mod state;

pub use crate::domain::model::{Dataset, TransformResult};
pub use crate::domain::ports::{Clock, Geocoder, Pipeline, Storage};
pub use crate::utils::error::Result;
