pub mod animation;
pub mod catalog;
pub mod image;
pub mod script;
