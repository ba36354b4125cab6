pub mod error;
pub mod health;
pub mod predict;
pub mod update;
