use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = nbs_api::Args::parse();

	nbs_api::run(args).await
}
