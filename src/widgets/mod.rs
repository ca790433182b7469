pub mod motivation;
pub mod notes;
pub mod speech;
pub mod timer;
pub mod vision;
