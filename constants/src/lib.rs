pub mod coordinate_system;
pub mod render_settings;
