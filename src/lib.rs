#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod area_resolver;
pub mod config;
pub mod coord_transform;
pub mod error;
pub mod logs;
pub mod road_sign;
pub mod route;
pub mod route_processor;
pub mod timeline;
pub mod utils;
