pub mod capture;
pub mod encoder;
