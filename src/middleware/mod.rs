pub mod auth;
pub mod guards;
pub mod rate_limit;
pub mod tenant;
