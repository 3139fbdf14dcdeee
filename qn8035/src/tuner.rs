//! Direct tuner control: channel selection, analog gain, reset and standby.

use crate::channel::ChannelWord;
use crate::registers::{AnalogGain, ChStep, ScanStep, System1, VolCtl};
use crate::{Bus, Registers, Result, RX, TX};
use std::thread::sleep;
use std::time::Duration;

/// The channel registers need a short pause before a receive request picks
/// the new word up.
const TUNE_SETTLE: Duration = Duration::from_micros(100);
/// Register file settle time after a software reset.
const RESET_SETTLE: Duration = Duration::from_secs(1);

impl<B: Bus> Registers<B> {
    /// Tunes the receiver to `word` and re-arms RDS reception. The channel
    /// index is pinned to the CH registers so the detector cannot move it.
    pub fn tune(&mut self, word: ChannelWord) -> Result<()> {
        self.CH().write(word.lsb())?;
        self.CH_STEP().write(ChStep {
            step: ScanStep::Step50kHz,
            ch_msb: word.msb(),
            start_msb: 0,
            stop_msb: 0,
        })?;
        sleep(TUNE_SETTLE);
        self.SYSTEM1()
            .write(System1::CCA_CH_DIS | System1::RXREQ | System1::RDSEN)
    }

    /// Rewrites the analog gain, preserving the control bits read back from
    /// the device.
    pub fn set_gain(&mut self, gain: AnalogGain) -> Result<()> {
        let ctl = self.VOL_CTL().read()?;
        self.VOL_CTL().write(VolCtl { gain, ..ctl })
    }

    /// Resets every register to its default and waits for the part to come
    /// back.
    pub fn soft_reset(&mut self) -> Result<()> {
        self.SYSTEM1().write(System1::SWRST)?;
        sleep(RESET_SETTLE);
        Ok(())
    }

    /// Recalibrates, resets, then drops into standby. Must run exactly once,
    /// at shutdown; the session enforces this by consuming itself first.
    pub fn standby(&mut self) -> Result<()> {
        self.SYSTEM1().write(System1::RECAL | System1::SWRST)?;
        sleep(TUNE_SETTLE);
        self.SYSTEM1().write(System1::STNBY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mockbus::MockBus;

    #[test]
    fn tune_writes_split_word_then_rx_request() {
        let mut regs = Registers::new(MockBus::new());
        regs.tune(ChannelWord(560)).unwrap();

        let rx = System1::CCA_CH_DIS | System1::RXREQ | System1::RDSEN;
        assert_eq!(
            regs.bus.writes,
            vec![(0x07, 0x30), (0x0A, 0x02), (0x00, rx.bits())]
        );
    }

    #[test]
    fn standby_recalibrates_first() {
        let mut regs = Registers::new(MockBus::new());
        regs.standby().unwrap();

        let recal = System1::RECAL | System1::SWRST;
        assert_eq!(
            regs.bus.writes,
            vec![(0x00, recal.bits()), (0x00, System1::STNBY.bits())]
        );
    }
}
