// SPDX-License-Identifier: MIT

/// Options for mounting one file onto a group of another.
#[derive(Debug, Clone, Default, PartialEq, PartialOrd)]
pub struct MountProps {
    /// Symbolic links stay within the mounted file.
    pub local: bool,
}
