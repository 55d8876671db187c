pub mod agent;
pub mod model;
pub mod plugin;
pub mod template;
pub mod timbre;
pub mod user;
