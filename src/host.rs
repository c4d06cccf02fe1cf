//! Capabilities the embedding shell provides. The core never holds host
//! lifecycle types; it only sees these traits.

use crate::index::DocumentChange;

/// Where documents come from: a vault on disk, a manifest, a test fixture.
pub trait DocumentSource {
    fn documents(&self) -> Vec<DocumentChange>;

    /// Document the host currently has open, used as the initial focal.
    fn active_document(&self) -> Option<String>;
}

/// Panel mount/unmount hooks implemented by the shell.
pub trait PanelLifecycle {
    fn on_mount(&mut self, source: &dyn DocumentSource);

    fn on_unmount(&mut self);
}
