//! Tracing support.
//!
//! Each module has a `TRACE` switch.  A function that wants to trace
//! invokes `tracer!(TRACE, "module::function")`, which defines a
//! local `t!` macro.  `t!` takes the same arguments as `format!`
//! (with up to five arguments), and prints the message prefixed with
//! the function name to stderr if the switch is on.

macro_rules! tracer {
    ( $TRACE:expr, $func:expr ) => {
        // Rust doesn't support $( ... ) in a nested macro's
        // definition, so we spell out the arities.
        #[allow(unused_macros)]
        macro_rules! t {
            ( $fmt:expr ) =>
            { if $TRACE { eprintln!("{}: {}", $func, $fmt) } };
            ( $fmt:expr, $a:expr ) =>
            { if $TRACE { eprintln!("{}: {}", $func, format!($fmt, $a)) } };
            ( $fmt:expr, $a:expr, $b:expr ) =>
            { if $TRACE { eprintln!("{}: {}", $func, format!($fmt, $a, $b)) } };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr ) =>
            { if $TRACE { eprintln!("{}: {}", $func, format!($fmt, $a, $b, $c)) } };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr, $d:expr ) =>
            { if $TRACE { eprintln!("{}: {}", $func, format!($fmt, $a, $b, $c, $d)) } };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr, $d:expr, $e:expr ) =>
            { if $TRACE { eprintln!("{}: {}", $func, format!($fmt, $a, $b, $c, $d, $e)) } };
        }
    };
}
