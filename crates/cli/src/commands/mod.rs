pub mod job;
pub mod providers;
pub mod status;
pub mod timeline;
