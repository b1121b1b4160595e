pub mod api;
pub mod config;
pub mod control;
pub mod db;
pub mod locks;
pub mod sensors;
