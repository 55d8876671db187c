pub mod diff;

pub use diff::{diff_plugin_mappings, PluginMappingDiff};
