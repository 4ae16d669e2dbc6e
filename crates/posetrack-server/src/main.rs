use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = posetrack_server::Options::parse();
    posetrack_server::init_tracing();
    posetrack_server::run(options).await
}
