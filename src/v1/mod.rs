pub mod cloud;
pub mod config;
pub mod datastore;
pub mod manager;
pub mod nomad;
pub mod plan;
pub mod registry;
pub mod resource;
pub mod storage;
