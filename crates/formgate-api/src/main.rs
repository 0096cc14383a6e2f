use formgate_core::Config;

// mimalloc keeps fragmentation low on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    formgate_core::config::load_dotenv();
    formgate_api::telemetry::init_telemetry();

    let config = Config::from_env()?;

    let (state, router, scheduler) = formgate_api::setup::initialize_app(config).await?;

    formgate_api::setup::server::start_server(state.clone(), router).await?;

    // Serve loop has drained; stop background work and release resources.
    scheduler.abort();
    formgate_api::setup::shutdown(&state).await;

    Ok(())
}
