//! Unix disk edit parameters

use super::client::DiskClient;
use chrono::SecondsFormat;
use crate::error::Result;
use sacloud_iaas::{
    DiskEditNote, DiskEditRequest, DiskEditSshKey, DiskEditUserSubnet, Id, Note, NoteCreateRequest,
};
use serde::Deserialize;
use tracing::info;

/// Edit parameters for disks built from Unix-like archives
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UnixEditRequest {
    pub host_name: String,
    pub password: String,

    pub disable_pw_auth: bool,
    pub enable_dhcp: bool,
    pub change_partition_uuid: bool,

    pub ip_address: String,
    pub network_mask_len: u8,
    pub default_route: String,

    /// Inline public keys
    pub ssh_keys: Vec<String>,
    /// Registered keys
    pub ssh_key_ids: Vec<Id>,

    /// Delete the notes created from `note_contents` once the disk is built
    pub is_notes_ephemeral: bool,
    /// Startup scripts registered as new notes before the edit
    pub note_contents: Vec<String>,
    /// Existing startup scripts
    pub notes: Vec<DiskEditNote>,
}

impl UnixEditRequest {
    /// Check that the referenced SSH keys and notes exist
    pub async fn validate(&self, client: &DiskClient) -> Result<()> {
        for id in &self.ssh_key_ids {
            client.ssh_key.read(*id).await?;
        }
        for note in &self.notes {
            client.note.read(note.id).await?;
        }
        Ok(())
    }

    /// Build the provider edit request, registering `note_contents` as notes
    ///
    /// Returns the notes that were created so the caller can delete them.
    pub async fn prepare(&self, client: &DiskClient) -> Result<(DiskEditRequest, Vec<Note>)> {
        let mut edit = self.to_edit_request();

        let mut generated = Vec::with_capacity(self.note_contents.len());
        let mut created_refs = Vec::with_capacity(self.note_contents.len());
        for content in &self.note_contents {
            let created = client
                .note
                .create(&NoteCreateRequest {
                    name: format!(
                        "note-{}",
                        chrono::Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
                    ),
                    class: "shell".to_string(),
                    content: content.clone(),
                })
                .await?;
            info!("Created startup script: {}", created.id);
            created_refs.push(DiskEditNote {
                id: created.id,
                ..Default::default()
            });
            generated.push(created);
        }
        created_refs.append(&mut edit.notes);
        edit.notes = created_refs;

        Ok((edit, generated))
    }

    /// The edit request without any generated notes
    pub fn to_edit_request(&self) -> DiskEditRequest {
        let user_subnet = if self.network_mask_len > 0 || !self.default_route.is_empty() {
            Some(DiskEditUserSubnet {
                network_mask_len: self.network_mask_len,
                default_route: self.default_route.clone(),
            })
        } else {
            None
        };

        let ssh_keys = self
            .ssh_keys
            .iter()
            .map(|key| DiskEditSshKey {
                public_key: key.clone(),
                ..Default::default()
            })
            .chain(self.ssh_key_ids.iter().map(|id| DiskEditSshKey {
                id: *id,
                ..Default::default()
            }))
            .collect();

        DiskEditRequest {
            background: true,
            password: self.password.clone(),
            ssh_keys,
            disable_pw_auth: self.disable_pw_auth,
            enable_dhcp: self.enable_dhcp,
            change_partition_uuid: self.change_partition_uuid,
            host_name: self.host_name.clone(),
            notes: self.notes.clone(),
            user_ip_address: (!self.ip_address.is_empty()).then(|| self.ip_address.clone()),
            user_subnet,
        }
    }
}

/// Delete generated notes
pub(crate) async fn delete_notes(client: &DiskClient, notes: &[Note]) -> Result<()> {
    for note in notes {
        info!("Deleting ephemeral startup script: {}", note.id);
        client.note.delete(note.id).await?;
    }
    Ok(())
}
