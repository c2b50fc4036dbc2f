pub mod air_quality;
pub mod balloon_point;
pub mod hour;
