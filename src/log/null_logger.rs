//! Without the `logging` feature nothing is installed, but the public API keeps working and the
//! `log` crate's max level still follows the configuration.

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}
