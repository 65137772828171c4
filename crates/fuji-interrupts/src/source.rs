use core::fmt;

/// One hardware origin of a scheduled interrupt.
///
/// The set is closed: every device that can raise a timed event on this
/// machine owns exactly the variants that correspond to its hardware
/// function, and nothing is added at runtime. The declaration order matters
/// twice over: equal-deadline dispatches break ties toward the lower
/// variant, and snapshots serialize slots in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptSource {
    /// Video vertical blank.
    VideoVbl,
    /// Video horizontal blank.
    VideoHbl,
    /// Video end-of-line.
    VideoEndline,
    /// Main MFP timer A.
    MfpTimerA,
    /// Main MFP timer B.
    MfpTimerB,
    /// Main MFP timer C.
    MfpTimerC,
    /// Main MFP timer D.
    MfpTimerD,
    /// Secondary (TT) MFP timer A.
    TtMfpTimerA,
    /// Secondary (TT) MFP timer B.
    TtMfpTimerB,
    /// Secondary (TT) MFP timer C.
    TtMfpTimerC,
    /// Secondary (TT) MFP timer D.
    TtMfpTimerD,
    /// ACIA interrupt from the keyboard controller serial link.
    AciaIkbd,
    /// Keyboard-controller reset timer.
    IkbdResetTimer,
    /// Keyboard-controller autosend timer.
    IkbdAutosend,
    /// Sound DMA / microwire event.
    DmaSound,
    /// Crossbar event in the 25 MHz clock domain.
    Crossbar25Mhz,
    /// Crossbar event in the 32 MHz clock domain.
    Crossbar32Mhz,
    /// Floppy disk controller event.
    Fdc,
    /// Blitter event.
    Blitter,
    /// MIDI ACIA event.
    Midi,
}

impl InterruptSource {
    pub const COUNT: usize = 20;

    /// Every source, in declaration (tie-break and serialization) order.
    pub const ALL: [InterruptSource; Self::COUNT] = [
        InterruptSource::VideoVbl,
        InterruptSource::VideoHbl,
        InterruptSource::VideoEndline,
        InterruptSource::MfpTimerA,
        InterruptSource::MfpTimerB,
        InterruptSource::MfpTimerC,
        InterruptSource::MfpTimerD,
        InterruptSource::TtMfpTimerA,
        InterruptSource::TtMfpTimerB,
        InterruptSource::TtMfpTimerC,
        InterruptSource::TtMfpTimerD,
        InterruptSource::AciaIkbd,
        InterruptSource::IkbdResetTimer,
        InterruptSource::IkbdAutosend,
        InterruptSource::DmaSound,
        InterruptSource::Crossbar25Mhz,
        InterruptSource::Crossbar32Mhz,
        InterruptSource::Fdc,
        InterruptSource::Blitter,
        InterruptSource::Midi,
    ];

    /// Slot index of this source.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<InterruptSource> {
        InterruptSource::ALL.get(index).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            InterruptSource::VideoVbl => "VIDEO_VBL",
            InterruptSource::VideoHbl => "VIDEO_HBL",
            InterruptSource::VideoEndline => "VIDEO_ENDLINE",
            InterruptSource::MfpTimerA => "MFP_TIMER_A",
            InterruptSource::MfpTimerB => "MFP_TIMER_B",
            InterruptSource::MfpTimerC => "MFP_TIMER_C",
            InterruptSource::MfpTimerD => "MFP_TIMER_D",
            InterruptSource::TtMfpTimerA => "TT_MFP_TIMER_A",
            InterruptSource::TtMfpTimerB => "TT_MFP_TIMER_B",
            InterruptSource::TtMfpTimerC => "TT_MFP_TIMER_C",
            InterruptSource::TtMfpTimerD => "TT_MFP_TIMER_D",
            InterruptSource::AciaIkbd => "ACIA_IKBD",
            InterruptSource::IkbdResetTimer => "IKBD_RESET_TIMER",
            InterruptSource::IkbdAutosend => "IKBD_AUTOSEND",
            InterruptSource::DmaSound => "DMA_SOUND",
            InterruptSource::Crossbar25Mhz => "CROSSBAR_25MHZ",
            InterruptSource::Crossbar32Mhz => "CROSSBAR_32MHZ",
            InterruptSource::Fdc => "FDC",
            InterruptSource::Blitter => "BLITTER",
            InterruptSource::Midi => "MIDI",
        }
    }
}

impl fmt::Display for InterruptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
