//! File content exchange with the vault

use crate::connection::ServerVersion;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::property::FILE_TYPE;
use crate::result::ItemResult;
use async_trait::async_trait;

/// A file to store alongside an upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub id: String,
    pub name: String,
    pub content: Vec<u8>,
}

/// Markup plus the files it references
#[derive(Debug, Clone, Default)]
pub struct UploadCommand {
    pub aml: String,
    pub files: Vec<UploadFile>,
}

impl UploadCommand {
    pub fn new<S: Into<String>>(aml: S) -> Self {
        Self {
            aml: aml.into(),
            files: Vec::new(),
        }
    }

    pub fn add_file<N: Into<String>>(&mut self, id: &str, name: N, content: Vec<u8>) -> &mut Self {
        self.files.push(UploadFile {
            id: id.to_string(),
            name: name.into(),
            content,
        });
        self
    }
}

/// Request for the content of a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCommand {
    pub file_id: String,
}

impl DownloadCommand {
    pub fn new<S: Into<String>>(file_id: S) -> Self {
        Self { file_id: file_id.into() }
    }

    /// Build from a `File` item; the item must carry an id
    pub fn from_item(item: &Item) -> Result<Self> {
        if item.type_name() != FILE_TYPE {
            return Err(Error::argument(format!(
                "expected a {} item but found '{}'",
                FILE_TYPE,
                item.type_name()
            )));
        }
        item.id()
            .map(Self::new)
            .ok_or_else(|| Error::argument("a file id is required"))
    }
}

/// How an upload is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// Files and markup are committed in one server transaction
    Transactional,
    /// Files are stored first, then the markup is applied
    NonTransactional,
}

impl UploadStrategy {
    pub fn for_version(version: &ServerVersion, transactional_min_major: u32) -> Self {
        let strategy = if version.major >= transactional_min_major {
            UploadStrategy::Transactional
        } else {
            UploadStrategy::NonTransactional
        };
        tracing::debug!(%version, ?strategy, "selected upload strategy");
        strategy
    }
}

#[async_trait(?Send)]
pub trait VaultConnection {
    async fn upload(&self, command: &UploadCommand) -> Result<ItemResult>;

    async fn download(&self, command: &DownloadCommand) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_switches_at_threshold() {
        assert_eq!(
            UploadStrategy::for_version(&ServerVersion::new(9, 4), 11),
            UploadStrategy::NonTransactional
        );
        assert_eq!(
            UploadStrategy::for_version(&ServerVersion::new(11, 0), 11),
            UploadStrategy::Transactional
        );
    }

    #[test]
    fn download_requires_a_file_item() {
        let part = Item::new(Some("Part"), Some("add"));
        assert!(matches!(DownloadCommand::from_item(&part), Err(Error::Argument(_))));

        let file = Item::new(Some("File"), Some("get"));
        assert!(DownloadCommand::from_item(&file).is_err());
        file.set_id(Some("ABCD1234")).unwrap();
        assert_eq!(DownloadCommand::from_item(&file).unwrap().file_id, "ABCD1234");
    }
}
