pub mod health;
pub mod programs;
pub mod webhooks;
