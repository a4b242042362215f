pub mod candidate;
pub mod comment;
pub mod feedback;
pub mod job;
pub mod notification;
pub mod pipeline;
pub mod tenant;
pub mod user;
