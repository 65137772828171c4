//! Scheduler snapshot encoding.
//!
//! The event table serializes into a single `SCHEDULER` section of the
//! container format in [`fuji_snapshot`]. Decoding is staged: the payload is
//! parsed and validated into a [`TableState`] first and only then applied,
//! so a corrupt image leaves the live table untouched. Handler bindings are
//! not part of the image; peripherals re-register after a restore.

use std::io::{Read, Seek, Write};

use fuji_cycles::MAX_FREQUENCY_SCALE;
use fuji_snapshot::{
    read_file_header, read_section_header, read_section_payload, skip_section_payload,
    write_file_header, write_section, ReadLeExt, Result, SectionId, SnapshotError, WriteLeExt,
};
use tracing::{debug, warn};

use crate::source::InterruptSource;
use crate::table::{EventTable, SlotImage, SlotState, TableState};

pub const SCHEDULER_SECTION_VERSION: u16 = 1;

/// Upper bound on an incoming scheduler section. The real payload is a few
/// hundred bytes; anything larger is a corrupt or hostile length field and
/// is rejected before allocation.
const MAX_SECTION_LEN: u64 = 64 * 1024;

const STATE_IDLE: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Writes the file header and the scheduler section for `table`.
pub fn save<W: Write + Seek>(w: &mut W, table: &EventTable) -> Result<()> {
    write_file_header(w)?;
    let state = table.save_state();
    write_section(w, SectionId::SCHEDULER, SCHEDULER_SECTION_VERSION, 0, |w| {
        encode_table(w, &state)
    })?;
    debug!(clock = state.clock, "scheduler state saved");
    Ok(())
}

/// Reads a snapshot stream and applies its scheduler section to `table`.
///
/// Unknown sections are skipped so images written by builds with more
/// devices still restore. The stream must contain exactly the sections it
/// declares; a missing or malformed scheduler section is an error and the
/// table keeps its pre-call state.
pub fn restore<R: Read>(r: &mut R, table: &mut EventTable) -> Result<()> {
    read_file_header(r)?;

    let mut state: Option<TableState> = None;
    while let Some(header) = read_section_header(r)? {
        if header.id == SectionId::SCHEDULER {
            if header.version != SCHEDULER_SECTION_VERSION {
                return Err(SnapshotError::Corrupt("unsupported scheduler section version"));
            }
            if header.len > MAX_SECTION_LEN {
                return Err(SnapshotError::Corrupt("scheduler section too large"));
            }
            let payload = read_section_payload(r, header.len)?;
            state = Some(decode_table(&mut payload.as_slice())?);
        } else {
            warn!(section = %header.id, len = header.len, "skipping unknown snapshot section");
            skip_section_payload(r, header.len)?;
        }
    }

    let state = state.ok_or(SnapshotError::Corrupt("missing scheduler section"))?;
    debug!(clock = state.clock, "scheduler state restored");
    table.restore_state(state);
    Ok(())
}

fn encode_table<W: Write>(w: &mut W, state: &TableState) -> Result<()> {
    w.write_u32_le(InterruptSource::COUNT as u32)?;
    for slot in &state.slots {
        let tag = match slot.state {
            SlotState::Idle => STATE_IDLE,
            SlotState::Active => STATE_ACTIVE,
            SlotState::Stopped => STATE_STOPPED,
        };
        w.write_u8(tag)?;
        w.write_u64_le(slot.deadline)?;
        w.write_u64_le(slot.armed_at)?;
    }
    w.write_u64_le(state.clock)?;
    w.write_u8(state.frequency_scale)?;
    Ok(())
}

fn decode_table<R: Read>(r: &mut R) -> Result<TableState> {
    let count = r.read_u32_le()?;
    if count as usize != InterruptSource::COUNT {
        return Err(SnapshotError::Corrupt("unexpected slot count"));
    }

    let mut slots = [SlotImage {
        state: SlotState::Idle,
        deadline: 0,
        armed_at: 0,
    }; InterruptSource::COUNT];
    for slot in &mut slots {
        let state = match r.read_u8()? {
            STATE_IDLE => SlotState::Idle,
            STATE_ACTIVE => SlotState::Active,
            STATE_STOPPED => SlotState::Stopped,
            _ => return Err(SnapshotError::Corrupt("invalid slot state tag")),
        };
        let deadline = r.read_u64_le()?;
        let armed_at = r.read_u64_le()?;
        *slot = SlotImage {
            state,
            deadline,
            armed_at,
        };
    }

    let clock = r.read_u64_le()?;
    let frequency_scale = r.read_u8()?;
    if frequency_scale > MAX_FREQUENCY_SCALE {
        return Err(SnapshotError::Corrupt("frequency scale out of range"));
    }
    for slot in &slots {
        // A deadline behind the clock is legal (due but not yet
        // acknowledged); an arm point ahead of the clock never is.
        if slot.state != SlotState::Idle && slot.armed_at > clock {
            return Err(SnapshotError::Corrupt("slot armed after the restored clock"));
        }
    }

    Ok(TableState {
        slots,
        clock,
        frequency_scale,
    })
}
