pub mod calendar;
pub mod index;
pub mod login;
