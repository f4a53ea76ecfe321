//! Filesystem access: the XFS metadata oracle and raw device reads

pub mod common;
pub mod xfs;
