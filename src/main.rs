use ue_metrics_influx::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
