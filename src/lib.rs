pub mod client;
pub mod commands;
pub mod controller;
pub mod domain;
pub mod drilldown;
pub mod inputter;
pub mod logging;
pub mod model;
pub mod preview;
pub mod schema;
pub mod server;
pub mod session;
pub mod shape;
pub mod store;
pub mod table;
pub mod ui;
