pub mod app;
pub mod cloud;
pub mod core;
pub mod lifecycle;
pub mod scanner;

include!(concat!(env!("OUT_DIR"), "/version.rs"));
