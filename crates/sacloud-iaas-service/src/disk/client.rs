use sacloud_iaas::{ApiCaller, ArchiveApi, DiskApi, DiskPlanApi, NoteApi, SshKeyApi};
use std::fmt;
use std::sync::Arc;

/// Provider operations used by the disk builders
#[derive(Clone)]
pub struct DiskClient {
    pub archive: Arc<dyn ArchiveApi>,
    pub disk: Arc<dyn DiskApi>,
    pub plan: Arc<dyn DiskPlanApi>,
    pub note: Arc<dyn NoteApi>,
    pub ssh_key: Arc<dyn SshKeyApi>,
}

impl DiskClient {
    pub fn new(caller: &dyn ApiCaller) -> Self {
        Self {
            archive: caller.archive(),
            disk: caller.disk(),
            plan: caller.disk_plan(),
            note: caller.note(),
            ssh_key: caller.ssh_key(),
        }
    }
}

impl fmt::Debug for DiskClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskClient").finish_non_exhaustive()
    }
}
