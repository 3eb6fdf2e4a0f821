#[macro_use]
extern crate log;

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod launcher;
pub mod logger;
pub mod pidfile;
pub mod ports;
pub mod probe;
pub mod procs;
pub mod registry;
pub mod supervisor;
pub mod ui;
pub mod watch_files;
pub mod watchdog;
pub mod web;

pub use miette::Result;
