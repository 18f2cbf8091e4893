pub mod detection;
pub mod discover;
pub mod health;
pub mod languages;
pub mod model;
pub mod translate;
