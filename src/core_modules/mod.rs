pub mod cluster_builder;
pub mod histogram;
pub mod mask;
pub mod patch;
pub mod preprocess;
pub mod window;
pub mod window_locator;
