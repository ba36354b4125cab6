use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Invalid TLE for {norad_id}: {message}")]
    InvalidTle { norad_id: u32, message: String },
    #[error("Propagation error: {0}")]
    Propagation(String),
    #[error("Invalid prediction window: {0}")]
    InvalidWindow(String),
}

impl From<sgp4::Error> for PredictError {
    fn from(err: sgp4::Error) -> Self {
        PredictError::Propagation(err.to_string())
    }
}
