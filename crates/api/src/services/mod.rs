//! External services and report builders.
//!
//! - [`payments`] - payment intents through a [`payments::PaymentGateway`]
//! - [`media`] - product photo hosting through a [`media::ImageHost`]
//! - [`stats`] - admin dashboard reports

pub mod media;
pub mod payments;
pub mod stats;
