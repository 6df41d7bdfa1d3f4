#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod db;
pub mod extract;
pub mod hash;
pub mod models;
pub mod schema;
pub mod token;
pub mod vision;
