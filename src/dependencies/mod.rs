pub mod js;
pub mod local;
pub mod module;
