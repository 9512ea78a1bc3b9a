//! Output macros.

/// Prefixes the first line of `text` with `initial_indent`, and
/// indents the remaining lines by the same width.
pub fn indent(initial_indent: &str, text: &str) -> String {
    let width = initial_indent.chars().count();
    let mut s = String::with_capacity(text.len() + initial_indent.len());
    for (i, line) in text.lines().enumerate() {
        if i == 0 {
            s.push_str(initial_indent);
        } else {
            s.push('\n');
            s.extend(std::iter::repeat(' ').take(width));
        }
        s.push_str(line);
    }
    if s.is_empty() {
        s.push_str(initial_indent);
    }
    s
}

/// Like `eprintln!`, but takes an optional `initial_indent`.
macro_rules! weprintln {
    () => {
        eprintln!()
    };
    (initial_indent = $indent:expr, $($arg:tt)*) => {
        eprintln!("{}", $crate::macros::indent($indent, &format!($($arg)*)))
    };
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

/// Defines a local `qprintln!`, which is like [`weprintln!`], but
/// prints nothing if `$quiet` is true.
///
/// The inner macro needs its own metavariables, so the `$` is passed
/// down as a token tree.  A `$` that ends a group is not a
/// metavariable, which is how `($)` gets through.
macro_rules! make_qprintln {
    (@with_dollar ($d:tt) $quiet:expr) => {
        #[allow(unused_variables)]
        let quiet: bool = $quiet;
        #[allow(unused_macros)]
        macro_rules! qprintln {
            ($d($d arg:tt)*) => {
                if ! quiet {
                    weprintln!($d($d arg)*);
                }
            };
        }
    };
    ($quiet:expr) => {
        make_qprintln!(@with_dollar ($) $quiet)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents_continuation_lines() {
        assert_eq!(indent("Error: ", "one\ntwo"), "Error: one\n       two");
        assert_eq!(indent("  - ", "one"), "  - one");
        assert_eq!(indent("  - ", ""), "  - ");
    }

    #[test]
    fn qprintln_expands() {
        fn run(quiet: bool) -> bool {
            make_qprintln!(quiet);
            qprintln!("not quiet");
            qprintln!(initial_indent = "Note: ", "{}", "not quiet");
            quiet
        }

        assert!(run(true));
        assert!(! run(false));
    }
}
