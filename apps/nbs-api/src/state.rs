use std::sync::Arc;

use nbs_service::NbSearchService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<NbSearchService>,
}
impl AppState {
	pub async fn new(config: nbs_config::Config) -> color_eyre::Result<Self> {
		let service = NbSearchService::new(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: NbSearchService) -> Self {
		Self { service: Arc::new(service) }
	}
}
