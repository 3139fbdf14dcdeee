//! Session state for the console: the device handle plus everything the
//! surrounding command loop owns - current channel, analog gain, RDS text.

use crate::channel::{Band, ChannelWord};
use crate::config::Config;
use crate::rds::{GroupPacket, PsName};
use crate::registers::AnalogGain;
use crate::scan::{autoscan, Direction, ScanOutcome};
use crate::{Bus, Error, Registers, Result, RX};

pub struct Session<B: Bus> {
    regs: Registers<B>,
    band: Band,
    current: ChannelWord,
    gain: AnalogGain,
    ps_name: PsName,
}

/// Read-only record for one status-line refresh.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub mhz: f64,
    pub snr: u8,
    pub rssi: u8,
    pub stereo: bool,
    pub ps_name: String,
}

impl<B: Bus> Session<B> {
    /// Probes the chip, resets it and tunes the configured startup station.
    /// A wrong chip identity or an unusable config is fatal here; nothing
    /// else validates them again.
    pub fn new(bus: B, config: &Config) -> Result<Session<B>> {
        let band = config.band();
        if band.low >= band.high || !band.contains_mhz(config.frequency_mhz) {
            return Err(Error::Invalid);
        }

        let mut regs = Registers::new(bus);
        regs.probe()?;
        regs.soft_reset()?;

        let current = ChannelWord::from_mhz(config.frequency_mhz);
        let gain = config.gain();
        regs.tune(current)?;
        regs.set_gain(gain)?;

        Ok(Session {
            regs,
            band,
            current,
            gain,
            ps_name: PsName::new(),
        })
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Retunes to a user-entered frequency. Out-of-band input is rejected
    /// without touching the receiver.
    pub fn tune_mhz(&mut self, mhz: f64) -> Result<()> {
        if !self.band.contains_mhz(mhz) {
            return Err(Error::OutOfBand(mhz));
        }

        let word = ChannelWord::from_mhz(mhz);
        self.regs.tune(word)?;
        self.current = word;
        // New station, stale text.
        self.ps_name.reset();
        Ok(())
    }

    /// Runs one hardware scan. Only a successful scan moves the current
    /// channel (and discards the RDS text); timeouts and rejected results
    /// leave the session untouched.
    pub fn scan(&mut self, dir: Direction) -> Result<ScanOutcome> {
        let outcome = autoscan(&mut self.regs, self.band, self.current, dir)?;
        if let ScanOutcome::Found(word) = outcome {
            self.current = word;
            self.ps_name.reset();
        }
        Ok(outcome)
    }

    pub fn volume_up(&mut self) -> Result<()> {
        self.gain = self.gain.up();
        self.regs.set_gain(self.gain)
    }

    pub fn volume_down(&mut self) -> Result<()> {
        self.gain = self.gain.down();
        self.regs.set_gain(self.gain)
    }

    /// Reads the signal metrics back from the device and folds the pending
    /// RDS group into the text buffers.
    pub fn refresh(&mut self) -> Result<Snapshot> {
        let lsb = self.regs.CH().read()?;
        let msb = self.regs.CH_STEP().read()?.ch_msb;
        let word = ChannelWord::from_parts(lsb, msb);

        let snr = self.regs.SNR().read()?;
        let rssi = self.regs.RSSISIG().read()?;
        let mono = self.regs.STATUS1().read()?.mono;

        let packet = GroupPacket::read(&mut self.regs)?;
        self.ps_name.feed(&packet, true);

        Ok(Snapshot {
            mhz: word.mhz(),
            snr,
            rssi,
            stereo: !mono,
            ps_name: self.ps_name.text().to_owned(),
        })
    }

    /// Shuts the receiver down. Consuming the session keeps the standby
    /// sequence from ever running twice.
    pub fn shutdown(mut self) -> Result<()> {
        self.regs.standby()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mockbus::MockBus;
    use crate::registers::{ChipId, System1};

    const CID2: usize = 0x06;
    const CH: u8 = 0x07;
    const VOL_CTL: usize = 0x14;

    fn mock() -> MockBus {
        let mut bus = MockBus::new();
        bus.regs[CID2] = ChipId::QN8035.into();
        bus
    }

    #[test]
    fn wrong_chip_id_is_fatal() {
        let mut bus = MockBus::new();
        bus.regs[CID2] = 0x22;
        let result = Session::new(bus, &Config::default());
        assert!(matches!(result, Err(Error::ChipId(0x22))));
    }

    #[test]
    fn inverted_band_is_fatal() {
        let mut config = Config::default();
        config.band.low_mhz = 108.0;
        config.band.high_mhz = 87.5;
        assert!(matches!(Session::new(mock(), &config), Err(Error::Invalid)));
    }

    #[test]
    fn session_drives_the_device() {
        let mut session = Session::new(mock(), &Config::default()).unwrap();

        // Startup reset came first, then the 88.0 MHz tune.
        assert_eq!(session.regs.bus.writes[0], (0x00, System1::SWRST.bits()));
        assert!(session.regs.bus.writes.contains(&(CH, ChannelWord(560).lsb())));

        // Out-of-band retune is rejected without bus traffic.
        let writes = session.regs.bus.writes.len();
        assert!(matches!(session.tune_mhz(200.0), Err(Error::OutOfBand(_))));
        assert_eq!(session.regs.bus.writes.len(), writes);

        // Retuning in band moves the channel registers.
        session.tune_mhz(98.0).unwrap();
        assert_eq!(session.regs.bus.regs[usize::from(CH)], ChannelWord::from_mhz(98.0).lsb());

        // A scan that never completes leaves the channel alone.
        session.regs.bus.scan_polls = None;
        assert_eq!(session.scan(Direction::Up).unwrap(), ScanOutcome::NoStation);
        assert_eq!(session.current, ChannelWord::from_mhz(98.0));

        // Gain saturates at both ends.
        for _ in 0..10 {
            session.volume_up().unwrap();
        }
        assert_eq!(session.regs.bus.regs[VOL_CTL] & 0x07, 7);
        for _ in 0..10 {
            session.volume_down().unwrap();
        }
        assert_eq!(session.regs.bus.regs[VOL_CTL] & 0x07, 0);

        session.shutdown().unwrap();
    }

    #[test]
    fn retune_discards_rds_text() {
        let mut session = Session::new(mock(), &Config::default()).unwrap();

        // Two identical reads of "AB" at offset 0 reach the visible text.
        session.regs.bus.regs[0x11] = b'A';
        session.regs.bus.regs[0x12] = b'B';
        session.refresh().unwrap();
        let snap = session.refresh().unwrap();
        assert_eq!(&snap.ps_name[..2], "AB");

        // A new station starts from a clean buffer; one read after the
        // retune is staged, not visible.
        session.tune_mhz(98.0).unwrap();
        let snap = session.refresh().unwrap();
        assert_eq!(&snap.ps_name[..2], "  ");
    }
}
