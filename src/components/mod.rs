pub mod chat_area;
pub mod settings;
pub mod sidebar;
