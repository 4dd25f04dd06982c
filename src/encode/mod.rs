pub mod raw;
pub mod wav;
