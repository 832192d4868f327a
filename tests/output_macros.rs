//! The display macros expand to paths inside the library, so they must
//! resolve from another crate just as they do in the `sentinel` binary.

use anyhow::Result;
use repo_sentinel::output::writer::{write_document, write_output};
use repo_sentinel::output::{self, OutputMode};
use repo_sentinel::{display_eprintln, display_print, display_println};

#[test]
fn test_display_macros_resolve_outside_the_library() -> Result<()> {
    output::init_with_verbosity(OutputMode::Human, false);
    assert_eq!(output::current_mode(), OutputMode::Human);

    display_print!("{} ", "scanning");
    display_println!("{} repositories", 3);
    display_println!();
    display_eprintln!("{} failed", 1);

    write_output(OutputMode::Json, format_args!("progress"), true)?;
    write_document("[]")?;
    Ok(())
}
