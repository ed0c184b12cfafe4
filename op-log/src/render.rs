//! Rendering of arguments and return values for log lines

use std::fmt::Debug;

/// Argument passed to a logged operation
pub type Arg<'a> = &'a (dyn Debug + Sync);

/// Default cap on a rendered value, in characters
pub const DEFAULT_MAX_RENDER_LEN: usize = 2048;

/// Render one value with `{:?}`, cut to `max_len` characters
pub fn render_value(value: &dyn Debug, max_len: usize) -> String {
    truncate(format!("{:?}", value), max_len)
}

/// Render an argument list as `a, b, c`
pub fn render_args(args: &[Arg<'_>], max_len: usize) -> String {
    args.iter()
        .map(|arg| render_value(*arg, max_len))
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(mut rendered: String, max_len: usize) -> String {
    if let Some((cut, _)) = rendered.char_indices().nth(max_len) {
        let total = rendered.chars().count();
        rendered.truncate(cut);
        rendered.push_str(&format!("...({} chars)", total));
    }
    rendered
}
