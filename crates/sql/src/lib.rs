#![doc = include_str!("../README.md")]

//! # SQL Connection Boundary
//!
//! Types shared between SQL drivers and the data-access layer.

#![forbid(unsafe_code)]

mod connection;
mod sqlite;
mod types;

pub use crate::connection::Connection;
pub use crate::sqlite::{ConnectOptions, SqliteConnection};
pub use crate::types::{DataType, Field, Row, Statement};
