/// Initializes stderr logging for the embedding application.
///
/// Keeps dependency logs at WARN by default; our crate is more verbose in
/// debug builds. Users can override with `TASKDECK_LOG` or `RUST_LOG`.
pub fn init_logging() -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{detailed_format, Logger};

    let default_spec = if cfg!(debug_assertions) {
        "warn,taskdeck=debug"
    } else {
        "warn,taskdeck=info"
    };
    let spec = std::env::var("TASKDECK_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            std::env::var("RUST_LOG")
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| default_spec.to_string());

    Logger::try_with_str(&spec)?
        .log_to_stderr()
        .format(detailed_format)
        .start()?;

    install_panic_hook();

    log::info!("logger initialized spec={spec}");
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|loc| format!("{loc}"))
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();

        // Best-effort: even if the logger is unavailable, still run the default hook.
        log::error!("panic: payload={payload} location={location}\nbacktrace:\n{backtrace}");
        default_hook(info);
    }));
}
