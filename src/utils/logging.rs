//! `env_logger` bootstrap and the per-module log macros.
//!
//! Every module that logs declares `const ENABLE_LOGS: bool` next to its
//! imports; the macros expand to nothing observable when it is `false`.

/// Install `env_logger` with an `Info` default, overridable through `RUST_LOG`.
///
/// Host shells may already have installed a logger, so a second call is a no-op.
pub fn init_logging() {
    let result = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();

    if result.is_ok() {
        log::info!("fieldcam logging initialised");
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_gated {
    ($level:expr, $($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::log!($level, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::log_gated!(::log::Level::Debug, $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::log_gated!(::log::Level::Info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::log_gated!(::log::Level::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::log_gated!(::log::Level::Error, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    mod silenced {
        const ENABLE_LOGS: bool = false;

        pub fn emit(hits: &mut u32) {
            crate::log_info!("never formatted {}", {
                *hits += 1;
                *hits
            });
        }
    }

    mod enabled {
        const ENABLE_LOGS: bool = true;

        pub fn emit(hits: &mut u32) {
            crate::log_error!("formatted {}", {
                *hits += 1;
                *hits
            });
            crate::log_debug!("debug");
            crate::log_warn!("warn");
        }
    }

    #[test]
    fn disabled_module_skips_argument_evaluation() {
        init_logging();
        init_logging();

        let mut hits = 0;
        silenced::emit(&mut hits);
        assert_eq!(hits, 0);

        enabled::emit(&mut hits);
        assert_eq!(hits, 1);
    }
}
