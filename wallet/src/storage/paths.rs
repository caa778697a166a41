use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::errors::{WalletError, WalletResult};

const BACKUP_PREFIX: &str = "aura_";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Filesystem layout under the wallet home directory.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    root_dir: PathBuf,
    vault_file: PathBuf,
    backup_dir: PathBuf,
    /// Session tokens and other state that may be discarded.
    cache_dir: PathBuf,
    config_file: PathBuf,
}

/// A vault backup on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

impl BackupEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl WalletPaths {
    pub const DEFAULT_VAULT_FILENAME: &'static str = "wallet.vault";
    pub const CONFIG_FILENAME: &'static str = "wallet.config";
    pub const AUTH_SESSION_FILENAME: &'static str = "auth_session.json";
    pub const BACKUP_EXTENSION: &'static str = "vault.bak";

    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            vault_file: root_dir.join(Self::DEFAULT_VAULT_FILENAME),
            backup_dir: root_dir.join("backups"),
            cache_dir: root_dir.join("cache"),
            config_file: root_dir.join(Self::CONFIG_FILENAME),
            root_dir,
        })
    }

    pub fn ensure_directories(&self) -> WalletResult<()> {
        for dir in [&self.root_dir, &self.backup_dir, &self.cache_dir] {
            fs::create_dir_all(dir)?;
            restrict_dir_permissions(dir)?;
        }
        Ok(())
    }

    pub fn vault_file(&self) -> &Path {
        &self.vault_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn auth_session_file(&self) -> PathBuf {
        self.cache_dir.join(Self::AUTH_SESSION_FILENAME)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Copy the vault into `backups/` under a timestamped name.
    pub fn create_vault_backup(&self) -> WalletResult<PathBuf> {
        if !self.vault_file.exists() {
            return Err(WalletError::NotFound(
                "Vault file does not exist, cannot create backup".to_string(),
            ));
        }
        fs::create_dir_all(&self.backup_dir)?;

        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT);
        let mut backup_path = self.backup_dir.join(format!(
            "{}{}.{}",
            BACKUP_PREFIX,
            timestamp,
            Self::BACKUP_EXTENSION
        ));
        // Two backups inside the same microsecond get a counter suffix.
        let mut counter = 1;
        while backup_path.exists() {
            backup_path = self.backup_dir.join(format!(
                "{}{}-{}.{}",
                BACKUP_PREFIX,
                timestamp,
                counter,
                Self::BACKUP_EXTENSION
            ));
            counter += 1;
        }

        fs::copy(&self.vault_file, &backup_path)?;

        let original_size = fs::metadata(&self.vault_file)?.len();
        let backup_size = fs::metadata(&backup_path)?.len();
        if original_size != backup_size {
            fs::remove_file(&backup_path)?;
            return Err(WalletError::StorageError(
                "Backup verification failed: size mismatch".to_string(),
            ));
        }

        log::info!("Created vault backup {}", backup_path.display());
        Ok(backup_path)
    }

    /// Find a backup by file name inside `backups/`.
    pub fn resolve_backup(&self, file_name: &str) -> WalletResult<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .filter(|n| n.to_string_lossy() == file_name)
            .ok_or_else(|| {
                WalletError::ValidationError(format!("Invalid backup name '{}'", file_name))
            })?;
        let path = self.backup_dir.join(name);
        if !path.is_file() {
            return Err(WalletError::NotFound(format!("Backup {}", file_name)));
        }
        Ok(path)
    }

    /// Replace the vault with `backup_path`. The current vault is put back if the
    /// copy fails part-way.
    pub fn restore_vault_from_backup(&self, backup_path: impl AsRef<Path>) -> WalletResult<()> {
        let backup_path = backup_path.as_ref();
        if !backup_path.exists() {
            return Err(WalletError::NotFound(format!(
                "Backup file does not exist: {}",
                backup_path.display()
            )));
        }

        let rollback = if self.vault_file.exists() {
            let rollback_path = self.vault_file.with_extension("vault.rollback");
            fs::copy(&self.vault_file, &rollback_path)?;
            Some(rollback_path)
        } else {
            None
        };

        let staged = self.vault_file.with_extension("vault.restore");
        let outcome = fs::copy(backup_path, &staged).and_then(|_| fs::rename(&staged, &self.vault_file));

        match outcome {
            Ok(()) => {
                if let Some(path) = rollback {
                    let _ = fs::remove_file(path);
                }
                log::info!("Restored vault from {}", backup_path.display());
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&staged);
                if let Some(path) = rollback {
                    let _ = fs::rename(&path, &self.vault_file);
                }
                Err(WalletError::StorageError(format!(
                    "Failed to restore vault from backup: {}",
                    err
                )))
            }
        }
    }

    /// All backups, newest first.
    pub fn list_backups(&self) -> WalletResult<Vec<BackupEntry>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || !name.ends_with(Self::BACKUP_EXTENSION) {
                continue;
            }
            backups.push(BackupEntry {
                created_at: parse_backup_timestamp(name),
                size_bytes: fs::metadata(&path)?.len(),
                path,
            });
        }

        // File names sort chronologically; fall back to them when no timestamp parses.
        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.file_name().cmp(&a.file_name()))
        });
        Ok(backups)
    }

    /// Delete old backups, keeping only the `keep_count` most recent.
    pub fn prune_old_backups(&self, keep_count: usize) -> WalletResult<usize> {
        let backups = self.list_backups()?;
        let mut deleted = 0;
        for backup in backups.iter().skip(keep_count) {
            fs::remove_file(&backup.path)?;
            deleted += 1;
        }
        if deleted > 0 {
            log::debug!("Pruned {} old vault backups", deleted);
        }
        Ok(deleted)
    }
}

/// Default wallet home: `~/.aura-wallet`.
pub fn default_root_dir() -> WalletResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".aura-wallet"))
        .ok_or_else(|| WalletError::StorageError("Cannot determine home directory".to_string()))
}

fn parse_backup_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(WalletPaths::BACKUP_EXTENSION)?
        .trim_end_matches('.');
    // Drop a collision counter if present.
    let stem = match stem.rsplit_once('-') {
        Some((base, counter)) if counter.chars().all(|c| c.is_ascii_digit()) => base,
        _ => stem,
    };
    NaiveDateTime::parse_from_str(stem, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(unix)]
fn restrict_dir_permissions(dir: &Path) -> WalletResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_dir: &Path) -> WalletResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_with_vault(contents: &[u8]) -> (TempDir, WalletPaths) {
        let temp = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp.path()).unwrap();
        paths.ensure_directories().unwrap();
        fs::write(paths.vault_file(), contents).unwrap();
        (temp, paths)
    }

    #[test]
    fn layout_under_root() {
        let temp = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp.path()).unwrap();
        assert_eq!(paths.vault_file(), temp.path().join("wallet.vault"));
        assert_eq!(paths.config_file(), temp.path().join("wallet.config"));
        assert_eq!(
            paths.auth_session_file(),
            temp.path().join("cache").join("auth_session.json")
        );
        assert!(matches!(
            WalletPaths::new(""),
            Err(WalletError::StorageError(_))
        ));
    }

    #[test]
    fn backup_requires_vault() {
        let temp = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp.path()).unwrap();
        paths.ensure_directories().unwrap();
        assert!(matches!(
            paths.create_vault_backup(),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn backups_list_newest_first_with_timestamps() {
        let (_temp, paths) = paths_with_vault(b"v1");
        let first = paths.create_vault_backup().unwrap();
        let second = paths.create_vault_backup().unwrap();
        let third = paths.create_vault_backup().unwrap();
        fs::write(paths.backup_dir().join("notes.txt"), b"ignored").unwrap();

        let backups = paths.list_backups().unwrap();
        let listed: Vec<_> = backups.iter().map(|b| b.path.clone()).collect();
        assert_eq!(listed, vec![third, second, first]);
        assert!(backups.iter().all(|b| b.created_at.is_some()));
        assert!(backups.iter().all(|b| b.size_bytes == 2));
    }

    #[test]
    fn restore_replaces_vault_contents() {
        let (_temp, paths) = paths_with_vault(b"original");
        let backup = paths.create_vault_backup().unwrap();
        fs::write(paths.vault_file(), b"changed").unwrap();

        let resolved = paths
            .resolve_backup(&backup.file_name().unwrap().to_string_lossy())
            .unwrap();
        paths.restore_vault_from_backup(&resolved).unwrap();
        assert_eq!(fs::read(paths.vault_file()).unwrap(), b"original");
        assert!(!paths.vault_file().with_extension("vault.rollback").exists());
    }

    #[test]
    fn resolve_backup_rejects_paths() {
        let (_temp, paths) = paths_with_vault(b"x");
        assert!(matches!(
            paths.resolve_backup("../wallet.vault"),
            Err(WalletError::ValidationError(_))
        ));
        assert!(matches!(
            paths.resolve_backup("aura_missing.vault.bak"),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn prune_keeps_newest() {
        let (_temp, paths) = paths_with_vault(b"x");
        for _ in 0..4 {
            paths.create_vault_backup().unwrap();
        }
        let before = paths.list_backups().unwrap();
        assert_eq!(paths.prune_old_backups(2).unwrap(), 2);
        let after = paths.list_backups().unwrap();
        assert_eq!(after, before[..2].to_vec());
        assert_eq!(paths.prune_old_backups(10).unwrap(), 0);
    }

    #[test]
    fn backup_timestamp_parsing() {
        let parsed = parse_backup_timestamp("aura_20240102_030405_000006.vault.bak").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-02T03:04:05.000006+00:00");
        assert!(parse_backup_timestamp("aura_20240102_030405_000006-2.vault.bak").is_some());
        assert!(parse_backup_timestamp("other.vault.bak").is_none());
    }
}
