pub mod protected;
pub mod status;
pub mod upload;
