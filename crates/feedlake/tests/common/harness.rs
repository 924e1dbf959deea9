//! Test harness: an isolated on-disk database plus pipeline wiring.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use feedlake::collector::{Orchestrator, OrchestratorSettings, Source};
use feedlake::db::Database;
use feedlake::pipeline::Pipeline;
use feedlake::quality::QualityValidator;
use feedlake::ratelimit::{default_profiles, RateLimitConfig, RateLimiter};
use feedlake::storage::{LakeStore, TieredStorage};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("feedlake.db");
        let db = Database::open(&db_path).expect("Failed to open database");
        Self {
            temp_dir,
            db_path,
            db,
        }
    }

    pub fn storage(&self) -> TieredStorage {
        TieredStorage::new(self.db.clone())
    }

    /// Built-in profiles plus a generous one for every other source name.
    pub fn limiter(sources: &[Arc<dyn Source>]) -> RateLimiter {
        let mut profiles = default_profiles();
        for source in sources {
            profiles
                .entry(source.name().to_string())
                .or_insert_with(|| RateLimitConfig::new(1000, 10_000, 100_000));
        }
        RateLimiter::new(profiles)
    }

    pub fn orchestrator(sources: Vec<Arc<dyn Source>>) -> Orchestrator {
        let mut orchestrator =
            Orchestrator::new(Self::limiter(&sources), OrchestratorSettings::default());
        for source in sources {
            orchestrator.register(source);
        }
        orchestrator
    }

    /// Pipeline over the harness database.
    pub fn pipeline(&self, sources: Vec<Arc<dyn Source>>) -> Pipeline {
        self.pipeline_with_store(sources, Arc::new(self.storage()))
    }

    pub fn pipeline_with_store(
        &self,
        sources: Vec<Arc<dyn Source>>,
        store: Arc<dyn LakeStore>,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(Self::orchestrator(sources)),
            store,
            QualityValidator::default(),
        )
    }

    pub fn counts(&self) -> BTreeMap<&'static str, u64> {
        let (bronze, silver, gold) = self.storage().counts(None).expect("counts");
        BTreeMap::from([("bronze", bronze), ("silver", silver), ("gold", gold)])
    }
}
