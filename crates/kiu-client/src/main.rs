use kiu_client_lib::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kiu_client_lib::init_tracing();

    let config = ClientConfig::from_env();
    tracing::info!(
        api = %config.api_base,
        socket = %config.socket_base,
        channels = config.channels.len(),
        "Starting BorderKiu chat client"
    );

    kiu_client_lib::run(config).await
}
