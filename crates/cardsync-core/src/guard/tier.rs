use std::fmt;

/// Escalating cleanup strategies, from cheapest to most aggressive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CleanupTier {
    /// Tracked files not in the preserve list.
    Minimal,
    /// Plus loose files in the temp directory and memory reclamation.
    Gentle,
    /// Plus the rest of the temp directory, subdirectories included.
    Force,
    /// Everything except the original image; the preserve list is ignored.
    Emergency,
}

/// Which part of the shared temp directory a tier clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempScope {
    Untouched,
    /// Top-level files only; subdirectories are left alone.
    Files,
    Everything,
}

impl CleanupTier {
    pub fn honors_preserve_list(self) -> bool {
        self != CleanupTier::Emergency
    }

    pub fn temp_scope(self) -> TempScope {
        match self {
            CleanupTier::Minimal => TempScope::Untouched,
            CleanupTier::Gentle => TempScope::Files,
            CleanupTier::Force | CleanupTier::Emergency => TempScope::Everything,
        }
    }

    pub fn reclaims_memory(self) -> bool {
        self >= CleanupTier::Gentle
    }
}

impl fmt::Display for CleanupTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupTier::Minimal => "minimal",
            CleanupTier::Gentle => "gentle",
            CleanupTier::Force => "force",
            CleanupTier::Emergency => "emergency",
        };
        f.write_str(name)
    }
}
