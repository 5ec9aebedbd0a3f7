//! Notification data model.
//!
//! A [`Notification`] bundles a device token, a JSON [`Payload`], an
//! optional identifier, an expiry and a delivery priority. The wire
//! encoding lives in [`crate::transport::frame`].

#[allow(clippy::module_inception)]
mod notification;
mod payload;

pub use notification::{Notification, NotificationPriority};
pub use payload::{AlertDictionary, Payload};
