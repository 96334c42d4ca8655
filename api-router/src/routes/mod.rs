pub mod admin;
pub mod auth;
pub mod jobs;
pub mod liveness;
pub mod readiness;
pub mod reference;
