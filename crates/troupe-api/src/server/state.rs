#[derive(Clone)]
struct AppState {
    service: Arc<ChatService>,
}

impl AppState {
    fn from_env() -> Result<Self, ConfigError> {
        let roster = roster_from_env()?;
        let policy = policy_from_env()?;
        Ok(Self::with_service(ChatService::new(roster, policy)))
    }

    fn with_service(service: ChatService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
