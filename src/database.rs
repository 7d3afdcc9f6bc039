use crate::storage::buffer::BufferManager;
use crate::storage::disk::FileManager;
use crate::storage::wal::LogManager;
use anyhow::{Context, Result};
use log::debug;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Settings for opening a [`Database`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding every data and log file.
    pub data_dir: PathBuf,
    /// Size of every block and page in bytes.
    pub block_size: usize,
    /// Number of buffers in the pool.
    pub buffer_pool_size: usize,
    /// Name of the log file inside `data_dir`.
    pub log_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("relstore_data"),
            block_size: 4096,
            buffer_pool_size: 8,
            log_file: "relstore.log".to_string(),
        }
    }
}

/// Wires the file manager, log manager and buffer pool together
pub struct Database {
    config: StorageConfig,
    file_manager: Arc<FileManager>,
    log_manager: Arc<Mutex<LogManager>>,
    buffer_manager: BufferManager,
}

impl Database {
    /// Open the database in `config.data_dir`, creating it if needed
    pub fn open(config: StorageConfig) -> Result<Self> {
        let file_manager = Arc::new(
            FileManager::new(&config.data_dir, config.block_size).with_context(|| {
                format!(
                    "failed to open data directory {:?} with block size {}",
                    config.data_dir, config.block_size
                )
            })?,
        );

        let log_manager = LogManager::new(Arc::clone(&file_manager), config.log_file.as_str())
            .with_context(|| format!("failed to open log file {}", config.log_file))?;
        let log_manager = Arc::new(Mutex::new(log_manager));

        let buffer_manager = BufferManager::new(
            Arc::clone(&file_manager),
            Arc::clone(&log_manager),
            config.buffer_pool_size,
        );

        debug!(
            "opened database in {:?} ({} byte blocks, {} buffers)",
            config.data_dir, config.block_size, config.buffer_pool_size
        );

        Ok(Self {
            config,
            file_manager,
            log_manager,
            buffer_manager,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn file_manager(&self) -> &Arc<FileManager> {
        &self.file_manager
    }

    pub fn log_manager(&self) -> &Arc<Mutex<LogManager>> {
        &self.log_manager
    }

    pub fn buffer_manager(&mut self) -> &mut BufferManager {
        &mut self.buffer_manager
    }

    /// Force the tail of the log to disk
    pub fn flush(&self) -> Result<()> {
        self.log_manager
            .lock()
            .force_flush()
            .context("failed to flush the log")?;
        Ok(())
    }
}
