mod config;
mod main_loop;
mod png_export;

pub use main_loop::start;
