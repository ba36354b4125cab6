mod compass;
mod error;
mod events;
mod ground_station;
mod pass_finder;
mod pass_reducer;
mod propagation;
mod types;

pub use error::PredictError;
pub use ground_station::Observer;
pub use pass_finder::{predict_passes, PassQuery};
pub use types::{PassRecord, Qualifier, QualifierKind};
