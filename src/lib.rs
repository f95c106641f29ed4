//! Client for a remote image compression service: uploads an image with a
//! target size, reports upload progress and saves the compressed result.

pub mod core;
pub mod i18n;
pub mod plugins;
