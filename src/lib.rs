//! Course Scout library.
//!
//! Collects Reddit posts advertising free courses, checks that their links
//! and vouchers still work, scores each post with an AI classifier and sends
//! one alert per worthwhile post and channel.

pub mod collect;
pub mod config;
pub mod constants;
pub mod db;
pub mod dedup;
pub mod notify;
pub mod pipeline;
pub mod score;
pub mod validate;
