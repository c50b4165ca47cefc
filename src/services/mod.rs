pub mod auth;
pub mod download_pipeline;
pub mod entity_store;
pub mod fanout;
pub mod integrations;
pub mod recommendation;
pub mod rules_engine;
pub mod scheduler;
pub mod settings;

pub use auth::AuthService;
pub use entity_store::EntityStore;
pub use fanout::Fanout;
pub use integrations::IntegrationRegistry;
pub use settings::SettingsStore;
