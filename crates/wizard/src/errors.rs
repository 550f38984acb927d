use std::sync::OnceLock;

use color_eyre::Result;
use tracing::error;

static INIT: OnceLock<()> = OnceLock::new();

/// Install the eyre and panic hooks. Safe to call more than once.
pub fn init() -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .panic_section("This is a bug in hostel-wizard. The log file in the data directory has details.")
        .capture_span_trace_by_default(false)
        .display_location_section(false)
        .display_env_section(false)
        .try_into_hooks()?;
    eyre_hook.install()?;

    std::panic::set_hook(Box::new(move |panic_info| {
        // leave raw mode and the alternate screen before printing anything
        if let Ok(mut t) = crate::tui::Tui::new() {
            if let Err(r) = t.exit() {
                error!("Unable to exit Terminal: {:?}", r);
            }
        }

        #[cfg(not(debug_assertions))]
        {
            use human_panic::{handle_dump, metadata, print_msg};
            let metadata = metadata!();
            let file_path = handle_dump(&metadata, panic_info);
            if print_msg(file_path, &metadata).is_err() {
                eprintln!("{}", panic_hook.panic_report(panic_info));
            }
        }
        let msg = format!("{}", panic_hook.panic_report(panic_info));
        error!("Error: {}", strip_ansi_escapes::strip_str(msg));

        #[cfg(debug_assertions)]
        {
            better_panic::Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .verbosity(better_panic::Verbosity::Full)
                .create_panic_handler()(panic_info);
        }

        std::process::exit(libc::EXIT_FAILURE);
    }));

    let _ = INIT.set(());
    Ok(())
}
