//! Logging macros that forward to `tracing` when the `tracing` feature is enabled.
//!
//! With the feature disabled every call compiles down to borrowing the logged values, so
//! variables that only appear in log lines do not trigger unused warnings.

macro_rules! define_log_macros {
    ($d:tt $($level:ident),+) => {$(
        #[cfg(feature = "tracing")]
        #[allow(unused_macros)]
        macro_rules! $level {
            ($d($d arg:tt)*) => {
                tracing::$level!(target: "chain_poller", $d($d arg)*)
            };
        }

        #[cfg(not(feature = "tracing"))]
        #[allow(unused_macros)]
        macro_rules! $level {
            ($d($d arg:tt)*) => {
                $crate::__discard_log_fields!($d($d arg)*)
            };
        }
    )+};
}

define_log_macros!($ error, warn, info, debug, trace);

#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! __discard_log_fields {
    ($field:ident = % $value:expr, $($rest:tt)*) => {{
        let _ = &$value;
        $crate::__discard_log_fields!($($rest)*);
    }};
    ($field:ident = ? $value:expr, $($rest:tt)*) => {{
        let _ = &$value;
        $crate::__discard_log_fields!($($rest)*);
    }};
    ($field:ident = $value:expr, $($rest:tt)*) => {{
        let _ = &$value;
        $crate::__discard_log_fields!($($rest)*);
    }};
    ($msg:literal $(, $arg:expr)* $(,)?) => {{
        $(let _ = &$arg;)*
    }};
    () => {};
}
