pub const SNAPSHOT_MAGIC: &[u8; 8] = b"FUJISNAP";
pub const SNAPSHOT_VERSION_V1: u16 = 1;
pub const SNAPSHOT_ENDIANNESS_LITTLE: u8 = 1;

/// Identifies one section of a save-state file.
///
/// Only the scheduler section exists today; the id space is kept open so
/// later machine state (CPU registers, RAM) can join the format without
/// breaking readers, which skip ids they do not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(pub u32);

impl SectionId {
    pub const SCHEDULER: SectionId = SectionId(1);

    pub fn name(self) -> Option<&'static str> {
        match self {
            SectionId::SCHEDULER => Some("SCHEDULER"),
            _ => None,
        }
    }
}

impl core::fmt::Display for SectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(name) = self.name() {
            write!(f, "{name}({})", self.0)
        } else {
            write!(f, "SectionId({})", self.0)
        }
    }
}
