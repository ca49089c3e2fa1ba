//! Signal- and image-domain processing of decoded sample data
pub mod bottom_detection;
pub mod filters;
