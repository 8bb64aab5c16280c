//! Per-connection ownership of the tailer, multiplexer and registry.

mod controller;


pub use controller::Connection;
