use std::path::PathBuf;

/// What a single application's merge restore did to the live profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    /// Directory the archive contents were merged into.
    pub target: PathBuf,
    /// Files written into the live profile.
    pub files_merged: usize,
    /// Files whose previous live contents were copied into the snapshot.
    pub files_snapshotted: usize,
    /// Snapshot created by this restore, if anything would have been overwritten.
    pub snapshot: Option<PathBuf>,
    /// Older snapshots removed by retention pruning.
    pub pruned: Vec<PathBuf>,
    /// Whether a safe storage key was (re)installed into the keyring.
    pub key_imported: bool,
}
