//! Artifact packaging: the on-disk constants, the bundled envelope container, and
//! the `ArtifactPacker` producing bundled or split artifacts.

pub mod envelope;
pub mod format;
pub mod packer;

pub use envelope::Envelope;
pub use packer::{
    Artifact, ArtifactPacker, BundledArtifact, OpenedArtifact, SplitArtifact, SplitStream,
};
