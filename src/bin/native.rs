#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    geodash::native::run(&args)
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // This binary is not meant to be used for WASM.
    // Use the library's `Dashboard` export instead.
}
