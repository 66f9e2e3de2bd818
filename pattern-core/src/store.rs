//! Persisted documents, one file per request addressed by a random token.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PatternError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternToken(Uuid);

impl PatternToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Anything that is not a UUID cannot name a stored document.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| PatternError::NotFound { id: s.to_string() })
    }
}

impl fmt::Display for PatternToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct PatternStore {
    dir: PathBuf,
    max_age: Option<Duration>,
}

impl PatternStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_age: None })
    }

    /// Documents older than `max_age` are treated as gone.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, token: PatternToken) -> PathBuf {
        self.dir.join(format!("{token}.svg"))
    }

    fn is_expired(&self, meta: &fs::Metadata) -> bool {
        let Some(max_age) = self.max_age else {
            return false;
        };
        meta.modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .is_some_and(|age| age >= max_age)
    }

    /// Write `svg` under a fresh token. The file appears atomically.
    pub fn persist(&self, svg: &str) -> Result<PatternToken> {
        let token = PatternToken::generate();
        self.persist_as(token, svg)?;
        Ok(token)
    }

    /// A failed write never leaves its temporary file behind.
    fn persist_as(&self, token: PatternToken, svg: &str) -> Result<()> {
        let tmp = self.dir.join(format!(".{token}.svg.tmp"));
        let written = fs::write(&tmp, svg).and_then(|()| fs::rename(&tmp, self.path_for(token)));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), "leaving temp file: {cleanup}");
            }
            return Err(e.into());
        }
        info!(%token, bytes = svg.len(), "stored pattern");
        Ok(())
    }

    /// Unknown, malformed and expired tokens all read as `NotFound`.
    pub fn fetch(&self, token: &str) -> Result<String> {
        let parsed = PatternToken::parse(token)?;
        let path = self.path_for(parsed);
        let not_found = || PatternError::NotFound {
            id: token.to_string(),
        };
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        if self.is_expired(&meta) {
            debug!(%parsed, "token expired");
            return Err(not_found());
        }
        Ok(fs::read_to_string(&path)?)
    }

    /// Remove expired documents; returns how many were deleted.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_doc = path.extension().is_some_and(|e| e == "svg")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| Uuid::parse_str(s).is_ok());
            if is_doc && self.is_expired(&entry.metadata()?) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "purged expired patterns");
        }
        Ok(removed)
    }
}
