/* Register value definitions
 *
 * One type can cover multiple registers, so defaults are not set here.
 * */
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
#[cfg(test)] use proptest::prelude::*;
#[cfg(test)] use proptest_derive::Arbitrary;

// newtype to placate the orphan rule
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reg8(pub u8);

impl From<u8> for Reg8 {
    fn from(item: u8) -> Self {
        Self(item)
    }
}

impl From<Reg8> for u8 {
    fn from(item: Reg8) -> Self {
        item.0
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn reg8_u8_inverse(n: u8) {
        assert_eq!(n, u8::from(Reg8::from(n)));
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct System1: u8 {
        const SWRST      = 0x80; // Reset all registers to defaults
        const RECAL      = 0x40; // Restart receiver calibration
        const STNBY      = 0x20; // Request standby mode
        const RXREQ      = 0x10; // Request receive mode
        const TXREQ      = 0x08; // Request transmit mode
        const CHSC       = 0x04; // Channel scan start; reads back as in-progress
        const RDSEN      = 0x02; // RDS reception enable
        const CCA_CH_DIS = 0x01; // Channel index follows CH, not the detector
    }
}

impl TryFrom<Reg8> for System1 {
    type Error = Reg8;
    fn try_from(item: Reg8) -> Result<Self, Self::Error> {
        Self::from_bits(item.0).ok_or(item)
    }
}

impl From<System1> for Reg8 {
    fn from(item: System1) -> Self {
        item.bits().into()
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn system1_read(b in prop::bits::u8::ANY) {
        assert_eq!(b, System1::try_from(Reg8(b)).unwrap().bits());
    }

    #[test]
    fn system1_inverse(b in prop::bits::u8::ANY.prop_map(
        |x| System1::from_bits(x).unwrap())) {
        assert_eq!(b, Reg8::from(b).try_into().unwrap());
    }
}

/// Receiver status. The high nibble exposes the control FSM state; only the
/// RDS-sync and stereo/mono flags matter to the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status1 {
    pub fsm: u8,
    pub rds_sync: bool,
    pub mono: bool,
}

impl TryFrom<Reg8> for Status1 {
    type Error = Reg8;
    fn try_from(item: Reg8) -> Result<Self, Self::Error> {
        Ok(Self {
            fsm: item.0 >> 4,
            rds_sync: item.0 & 0x02 != 0,
            mono: item.0 & 0x01 != 0,
        })
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn status1_read(b in prop::bits::u8::ANY) {
        let status = Status1::try_from(Reg8(b)).unwrap();
        assert_eq!(status.fsm, b >> 4);
        assert_eq!(status.mono, b & 0x01 != 0);
    }
}

/// CID2 identity byte; family in the high nibble, version in the low.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipId(pub u8);

impl ChipId {
    pub const QN8035: ChipId = ChipId(0x84);
}

impl TryFrom<Reg8> for ChipId {
    type Error = Reg8;
    fn try_from(item: Reg8) -> Result<Self, Self::Error> {
        Ok(Self(item.0))
    }
}

impl From<ChipId> for u8 {
    fn from(item: ChipId) -> Self {
        item.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
pub enum ScanStep {
    Step50kHz  = 0b00,
    Step100kHz = 0b01,
    Step200kHz = 0b10,
}

/// CH_STEP packs the scan step size with the high bits of the channel,
/// scan-start and scan-stop words.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChStep {
    pub step: ScanStep,
    pub ch_msb: u8,    // bits [1:0]
    pub start_msb: u8, // bits [3:2]
    pub stop_msb: u8,  // bits [5:4]
}

impl TryFrom<Reg8> for ChStep {
    type Error = Reg8;
    fn try_from(item: Reg8) -> Result<Self, Self::Error> {
        Ok(Self {
            step: ScanStep::try_from(item.0 >> 6).or(Err(item))?,
            ch_msb: item.0 & 0x03,
            start_msb: (item.0 >> 2) & 0x03,
            stop_msb: (item.0 >> 4) & 0x03,
        })
    }
}

impl From<ChStep> for Reg8 {
    fn from(item: ChStep) -> Self {
        (u8::from(item.step) << 6
            | (item.stop_msb & 0x03) << 4
            | (item.start_msb & 0x03) << 2
            | item.ch_msb & 0x03)
            .into()
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn chstep_inverse(t in (any::<ScanStep>(), 0u8..4, 0u8..4, 0u8..4).prop_map(
        |(step, ch_msb, start_msb, stop_msb)| ChStep { step, ch_msb, start_msb, stop_msb })) {
        assert_eq!(t, Reg8::from(t).try_into().unwrap());
    }
}

#[test]
fn chstep_rejects_undefined_step() {
    assert!(ChStep::try_from(Reg8(0xC0)).is_err());
}

/// Discrete analog output gain, 0..=7. Steps saturate at the ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AnalogGain(u8);

impl AnalogGain {
    pub const MIN: AnalogGain = AnalogGain(0);
    pub const MAX: AnalogGain = AnalogGain(7);

    pub fn clamped(level: u8) -> AnalogGain {
        AnalogGain(level.min(Self::MAX.0))
    }

    pub fn up(self) -> AnalogGain {
        AnalogGain((self.0 + 1).min(Self::MAX.0))
    }

    pub fn down(self) -> AnalogGain {
        AnalogGain(self.0.saturating_sub(1))
    }
}

impl From<AnalogGain> for u8 {
    fn from(item: AnalogGain) -> Self {
        item.0
    }
}

/// VOL_CTL carries the analog gain in its low 3 bits; the remaining control
/// bits are held opaquely so read-modify-write cycles preserve them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolCtl {
    pub gain: AnalogGain,
    pub rest: u8, // bits [7:3], as read back
}

impl TryFrom<Reg8> for VolCtl {
    type Error = Reg8;
    fn try_from(item: Reg8) -> Result<Self, Self::Error> {
        Ok(Self {
            gain: AnalogGain(item.0 & 0x07),
            rest: item.0 & 0xF8,
        })
    }
}

impl From<VolCtl> for Reg8 {
    fn from(item: VolCtl) -> Self {
        (item.rest & 0xF8 | u8::from(item.gain)).into()
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn volctl_inverse(t in (0u8..8, any::<u8>()).prop_map(
        |(gain, rest)| VolCtl { gain: AnalogGain(gain), rest: rest & 0xF8 })) {
        assert_eq!(t, Reg8::from(t).try_into().unwrap());
    }

    #[test]
    fn gain_never_leaves_range(steps in prop::collection::vec(any::<bool>(), 0..64)) {
        let mut gain = AnalogGain::MAX;
        for step in steps {
            gain = if step { gain.up() } else { gain.down() };
            assert!(gain >= AnalogGain::MIN && gain <= AnalogGain::MAX);
        }
    }
}
