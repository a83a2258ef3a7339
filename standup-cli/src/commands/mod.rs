pub mod delete;
pub mod init;
pub mod post;
pub mod react;
pub mod speaker;
pub mod status;
pub mod team;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;

use standup_core::{local, RecordKey, SessionId, StandupConfig, TeamName};
use standup_sync::{
    CachedStore, CycleOutcome, EngineConfig, HttpObjectStore, HttpStoreConfig, SyncEngine,
    WriteCoordinator,
};

/// Flags accepted by every command.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Team to act on instead of the configured one.
    #[arg(long, global = true)]
    pub team: Option<String>,

    /// Session to act on instead of today's (UTC date).
    #[arg(long, global = true)]
    pub session: Option<String>,
}

/// Home directory, loaded config and the derived identities for a command.
pub struct Context {
    pub home: PathBuf,
    pub config: StandupConfig,
}

impl Context {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let home = home_dir()?;
        let mut config = local::load_config_at(&home)
            .context("failed to load config; run `standup init` first")?;
        if let Some(team) = &overrides.team {
            config.team = TeamName::from(team.as_str());
        }
        if let Some(session) = &overrides.session {
            config.session = Some(SessionId::from(session.as_str()));
        }
        Ok(Self { home, config })
    }

    pub fn team(&self) -> &TeamName {
        &self.config.team
    }

    pub fn session(&self) -> SessionId {
        self.config.session_id()
    }

    /// The local writer's record for the active team and session.
    pub fn own_key(&self) -> RecordKey {
        RecordKey {
            team: self.config.team.clone(),
            writer: self.config.writer.clone(),
            session: self.session(),
        }
    }

    pub fn store(&self) -> Result<Arc<CachedStore<HttpObjectStore>>> {
        let http = HttpObjectStore::new(HttpStoreConfig::from_config(&self.config))
            .with_context(|| format!("invalid store URL '{}'", self.config.store_url))?;
        Ok(Arc::new(CachedStore::new(http)))
    }

    pub fn coordinator(&self) -> Result<WriteCoordinator<HttpObjectStore>> {
        Ok(WriteCoordinator::new(
            self.store()?,
            self.config.data_dir.clone(),
        ))
    }

    /// An engine over `store` with the remembered passphrase for the team.
    pub fn engine(
        &self,
        store: Arc<CachedStore<HttpObjectStore>>,
    ) -> Result<SyncEngine<HttpObjectStore>> {
        let engine = SyncEngine::new(store, EngineConfig::from_config(&self.config));
        engine.set_passphrase(self.cached_passphrase()?);
        Ok(engine)
    }

    pub fn cached_passphrase(&self) -> Result<Option<String>> {
        local::cached_passphrase_at(&self.home, self.team())
            .context("failed to read the passphrase cache")
    }

    /// Run one sync cycle and return its outcome.
    pub fn sync_once(&self) -> Result<CycleOutcome> {
        let engine = self.engine(self.store()?)?;
        engine.run_cycle().with_context(|| {
            format!(
                "failed to fetch status for team '{}' session '{}'",
                self.team(),
                self.session()
            )
        })
    }
}

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub fn locked_hint(team: &TeamName) -> String {
    format!("team '{team}' is protected; run `standup team unlock {team} <passphrase>`")
}
