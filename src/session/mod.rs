//! Voice interaction session: controller, inputs and event loop.

pub mod controller;
pub mod messages;
pub mod runtime;
