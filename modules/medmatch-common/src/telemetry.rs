use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Respects `RUST_LOG`; defaults the `medmatch` crates to info.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                "medmatch=info"
                    .parse()
                    .expect("static directive must parse"),
            ),
        )
        .init();
}
