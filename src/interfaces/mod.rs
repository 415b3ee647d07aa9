//! Interface adapters exposing the application layer.

pub mod cli;
