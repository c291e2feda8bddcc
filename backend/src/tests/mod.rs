pub mod helpers;
pub mod integration;
