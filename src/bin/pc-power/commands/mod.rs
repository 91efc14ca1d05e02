pub mod check;
pub mod config;
pub mod doctor;
pub mod status;
pub mod tap;
pub mod tick;
pub mod watch;
