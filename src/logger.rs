// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A pluggable logging sink.
//!
//! A library has no console of its own, so `println!`/`print!` are
//! routed through a `Logger` trait that a host registers once; with
//! nothing registered the crate stays silent.

use core::fmt;
use spin::Once;

pub trait Logger: Sync {
    fn log_line(&self, args: fmt::Arguments<'_>);
}

static LOGGER: Once<&'static dyn Logger> = Once::new();

/// Registers the logging sink used by [`log_line`]. Only the first
/// call has an effect; later calls are ignored, matching the
/// one-shot-init style of the mount handle in [`crate::api`].
pub fn set_logger(logger: &'static dyn Logger) {
    LOGGER.call_once(|| logger);
}

#[doc(hidden)]
pub fn log_line(args: fmt::Arguments<'_>) {
    if let Some(logger) = LOGGER.get() {
        logger.log_line(args);
    }
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::logger::log_line(format_args!("\n"))
    };
    ($($arg:tt)*) => {{
        $crate::logger::log_line(format_args!("{}\n", format_args!($($arg)*)));
    }};
}
