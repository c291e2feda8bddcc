pub mod dashboard;
pub mod magic_link;
pub mod users;
