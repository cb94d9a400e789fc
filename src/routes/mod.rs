pub mod health;
pub mod runner;
