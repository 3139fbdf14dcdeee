//! Hardware-assisted channel search.
//!
//! The receiver steps itself from a start word toward a stop word and clears
//! the CHSC request bit once it settles on a channel (or runs out of band).
//! Completion is polled on a fixed budget. Around the middle of the band the
//! scanner is known to wrap to 85 MHz or 111 MHz; such results are pulled
//! back to just past the wrap point before they are accepted.

use crate::channel::{Band, ChannelWord};
use crate::registers::{ChStep, ScanStep, System1};
use crate::{Bus, Registers, Result, RX, TX};
use std::thread::sleep;
use std::time::Duration;

/// Detection level written to CCA before a scan is triggered.
const CCA_LEVEL: u8 = 0x10;
const SNR_TH_1: u8 = 0x00;
const SNR_TH_2: u8 = 0x05;
const NOISE_FIR: u8 = 0x05;

/// The search starts one 200 kHz step away from the current channel.
const START_OFFSET: u16 = 4;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const POLL_ATTEMPTS: u32 = 25; // 2.5 s budget

/// Channel word the scanner wraps around, and the words it resumes from on
/// either side of it.
const WRAP_PIVOT_MHZ: f64 = 98.3;
const RESUME_UP_MHZ: f64 = 98.4;
const RESUME_DOWN_MHZ: f64 = 98.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scanner settled on a channel strictly inside the band.
    Found(ChannelWord),
    /// The in-progress bit never cleared within the poll budget.
    NoStation,
    /// The scan finished but the reported word failed the band check.
    OutOfBand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Poll {
    Complete,
    TimedOut,
}

/// Re-checks `done` every `interval`, at most `attempts` times.
fn poll_until(
    interval: Duration,
    attempts: u32,
    mut done: impl FnMut() -> Result<bool>,
) -> Result<Poll> {
    for _ in 0..attempts {
        if done()? {
            return Ok(Poll::Complete);
        }
        sleep(interval);
    }
    Ok(Poll::TimedOut)
}

/// Runs one scan from `current` toward the band edge in `dir`. The caller
/// owns the current-channel state; only a `Found` outcome should move it.
pub fn autoscan<B: Bus>(
    regs: &mut Registers<B>,
    band: Band,
    current: ChannelWord,
    dir: Direction,
) -> Result<ScanOutcome> {
    // Static detection tuning.
    regs.CCA_SNR_TH_1().write(SNR_TH_1)?;
    regs.CCA_SNR_TH_2().write(SNR_TH_2)?;
    regs.NCCFIR3().write(NOISE_FIR)?;

    let (start, stop) = match dir {
        Direction::Up => (ChannelWord(current.0 + START_OFFSET), band.high),
        Direction::Down => (ChannelWord(current.0.saturating_sub(START_OFFSET)), band.low),
    };

    regs.CH_START().write(start.lsb())?;
    regs.CH_STOP().write(stop.lsb())?;
    regs.CH_STEP().write(ChStep {
        step: ScanStep::Step200kHz,
        ch_msb: current.msb(),
        start_msb: start.msb(),
        stop_msb: stop.msb(),
    })?;
    regs.CCA().write(CCA_LEVEL)?;

    // Kick the search off.
    regs.SYSTEM1()
        .write(System1::RXREQ | System1::CHSC | System1::RDSEN)?;

    let done = poll_until(POLL_INTERVAL, POLL_ATTEMPTS, || {
        Ok(!regs.SYSTEM1().read()?.contains(System1::CHSC))
    })?;
    if done == Poll::TimedOut {
        return Ok(ScanOutcome::NoStation);
    }

    let lsb = regs.CH().read()?;
    let msb = regs.CH_STEP().read()?.ch_msb;
    let mut found = ChannelWord::from_parts(lsb, msb);

    let pivot = ChannelWord::from_mhz(WRAP_PIVOT_MHZ);
    let fix = if found < band.low && current >= band.low && current < pivot {
        Some(ChannelWord::from_mhz(RESUME_UP_MHZ))
    } else if found > band.high && current >= pivot && current < band.high {
        Some(ChannelWord::from_mhz(RESUME_DOWN_MHZ))
    } else {
        None
    };
    if let Some(word) = fix {
        // Scanner wrapped out of band; retune past the wrap point.
        regs.tune(word)?;
        found = word;
    }

    if band.interior(found) {
        Ok(ScanOutcome::Found(found))
    } else {
        Ok(ScanOutcome::OutOfBand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mockbus::MockBus;

    const CH: usize = 0x07;

    fn regs_with_result(lsb: u8, polls: Option<u32>) -> Registers<MockBus> {
        let mut bus = MockBus::new();
        bus.regs[CH] = lsb;
        bus.scan_polls = polls;
        Registers::new(bus)
    }

    #[test]
    fn scan_up_finds_station() {
        // current 88.0 MHz = word 560; the scanner reports word 602.
        let mut regs = regs_with_result(90, Some(0));
        let outcome = autoscan(&mut regs, Band::default(), ChannelWord(560), Direction::Up).unwrap();
        assert_eq!(outcome, ScanOutcome::Found(ChannelWord(602)));
    }

    #[test]
    fn scan_triggers_with_chsc() {
        let mut regs = regs_with_result(90, Some(0));
        autoscan(&mut regs, Band::default(), ChannelWord(560), Direction::Up).unwrap();

        let trigger = System1::RXREQ | System1::CHSC | System1::RDSEN;
        assert!(regs.bus.writes.contains(&(0x00, trigger.bits())));
    }

    #[test]
    fn scan_timeout_reports_no_station() {
        let mut regs = regs_with_result(90, None);
        let outcome = autoscan(&mut regs, Band::default(), ChannelWord(560), Direction::Up).unwrap();
        assert_eq!(outcome, ScanOutcome::NoStation);
        // The channel registers were never rewritten.
        assert!(!regs.bus.writes.iter().any(|&(addr, _)| addr == CH as u8));
    }

    #[test]
    fn scan_up_wrap_is_pulled_back() {
        // current 90.0 MHz = word 600 (msb 2); the scanner wraps below the
        // band: read-back word 520 < 550. Expect a retune to 98.4 MHz.
        let mut regs = regs_with_result(8, Some(0));
        let outcome = autoscan(&mut regs, Band::default(), ChannelWord(600), Direction::Up).unwrap();

        let fixed = ChannelWord::from_mhz(98.4);
        assert_eq!(outcome, ScanOutcome::Found(fixed));
        assert!(regs.bus.writes.contains(&(CH as u8, fixed.lsb())));
    }

    #[test]
    fn scan_down_wrap_is_pulled_back() {
        // current 98.5 MHz = word 770 (msb 3); read-back word 968 > 960.
        let mut regs = regs_with_result(200, Some(0));
        let outcome =
            autoscan(&mut regs, Band::default(), ChannelWord(770), Direction::Down).unwrap();

        let fixed = ChannelWord::from_mhz(98.2);
        assert_eq!(outcome, ScanOutcome::Found(fixed));
        assert!(regs.bus.writes.contains(&(CH as u8, fixed.lsb())));
    }

    #[test]
    fn scan_wrap_far_from_pivot_is_rejected() {
        // Same below-band read-back, but the prior channel is past the
        // pivot, so no correction applies and the result is dropped.
        let mut regs = regs_with_result(8, Some(0));
        let outcome = autoscan(&mut regs, Band::default(), ChannelWord(800), Direction::Up).unwrap();
        assert_eq!(outcome, ScanOutcome::OutOfBand);
    }
}
