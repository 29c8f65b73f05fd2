#![forbid(unsafe_code)]

//! Core of the vidshare video site: signed access to stored media, the
//! player's transport state machine, the catalog behind the pages and the
//! YouTube search proxy.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod player;
pub mod proxy;
pub mod session;
pub mod storage;
