//! The porla webhook notifier: configuration loading, the event feed and
//! the controller that ties them to the webhook dispatcher.

pub mod config;
pub mod controller;
pub mod feed;

pub use controller::Porla;
