pub mod auth;
pub mod backend;
pub mod health;
pub mod score;
pub mod validation;
