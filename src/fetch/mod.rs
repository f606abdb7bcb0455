pub mod image_fetch;
pub mod worker;
