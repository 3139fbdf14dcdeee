use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal;
use mio::{unix::SourceFd, Events, Interest, Poll, Token};
use mio_signals::{Signal, Signals};
use qn8035::channel::Band;
use qn8035::config::Config;
use qn8035::scan::Direction;
use qn8035::session::{Session, Snapshot};
use std::fs::read_to_string;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::time::Duration;
use timerfd::{SetTimeFlags, TimerFd, TimerState};

#[derive(Parser, Debug)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,
    /// I2C adapter, overrides the config file.
    #[arg(short, long)]
    bus: Option<String>,
    /// Startup frequency in MHz, overrides the config file.
    #[arg(short, long)]
    frequency: Option<f64>,
}

/// Keeps the terminal cooked again on every exit path.
struct RawMode;

impl RawMode {
    fn enter() -> Result<RawMode> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

const HELP: &str =
    "[C] Change Frequency   [<] Scan Down   [>] Scan Up   [+] Volume Up   [-] Volume Down   [Q] Quit";

/// Runs in cooked mode. Reprompts until the frequency lands in the band;
/// `None` means stdin was closed.
fn prompt_frequency(band: Band) -> Result<Option<f64>> {
    loop {
        print!("\nFrequency: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if let Ok(mhz) = line.trim().parse::<f64>() {
            if band.contains_mhz(mhz) {
                return Ok(Some(mhz));
            }
        }
        println!(
            "Invalid frequency, accepted range is {:.2}MHz to {:.2}MHz.",
            band.low.mhz(),
            band.high.mhz()
        );
    }
}

fn render(snap: &Snapshot) -> Result<()> {
    print!(
        "\rFreq: {:.2}MHz | SNR : {} | RSSI : {} | {} | {} |",
        snap.mhz,
        snap.snr,
        snap.rssi,
        if snap.stereo { 'S' } else { 'M' },
        snap.ps_name,
    );
    io::stdout().flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config: Config = match &args.config {
        Some(path) => toml::from_str(&read_to_string(path)?)
            .with_context(|| format!("bad config file {path}"))?,
        None => Config::default(),
    };
    if let Some(bus) = args.bus {
        config.bus = bus;
    }
    if let Some(frequency) = args.frequency {
        config.frequency_mhz = frequency;
    }

    let bus = qn8035::open(&config.bus)
        .with_context(|| format!("Unable to initialize the QN8035 receiver on {}", config.bus))?;

    println!("initializing QN8035 tuner...");
    let mut session = Session::new(bus, &config).context("receiver startup failed")?;

    let mut poll = Poll::new()?;
    let registry = poll.registry();

    const CTRLC: Token = Token(0);
    let mut signals = Signals::new(Signal::Interrupt | Signal::Terminate)?;
    registry.register(&mut signals, CTRLC, Interest::READABLE)?;

    const TICK: Token = Token(1);
    let mut tfd = TimerFd::new()?;
    tfd.set_state(
        TimerState::Periodic {
            current: Duration::from_millis(50),
            interval: Duration::from_millis(50),
        },
        SetTimeFlags::Default,
    );
    registry.register(&mut SourceFd(&tfd.as_raw_fd()), TICK, Interest::READABLE)?;

    const STDIN: Token = Token(2);
    let stdin_fd = io::stdin().as_raw_fd();
    registry.register(&mut SourceFd(&stdin_fd), STDIN, Interest::READABLE)?;

    println!("{HELP}");
    let mut raw = Some(RawMode::enter()?);

    let mut events = Events::with_capacity(16);
    'outer: loop {
        poll.poll(&mut events, None)?;
        for event in events.iter() {
            match event.token() {
                TICK => {
                    tfd.read();
                    render(&session.refresh()?)?;
                }
                STDIN => {
                    let mut buf = [0; 16];
                    let n = io::stdin().read(&mut buf)?;
                    for &key in &buf[..n] {
                        match key {
                            b'c' | b'C' => {
                                // Line input needs the cooked terminal back.
                                raw = None;
                                match prompt_frequency(session.band())? {
                                    Some(mhz) => session.tune_mhz(mhz)?,
                                    None => break 'outer,
                                }
                                println!("{HELP}");
                                raw = Some(RawMode::enter()?);
                            }
                            b'.' | b'>' => {
                                session.scan(Direction::Up)?;
                            }
                            b',' | b'<' => {
                                session.scan(Direction::Down)?;
                            }
                            b'=' | b'+' => session.volume_up()?,
                            b'-' => session.volume_down()?,
                            // Raw mode turns ^C into a plain byte.
                            b'q' | b'Q' | 0x03 => break 'outer,
                            _ => {}
                        }
                    }
                }
                CTRLC => break 'outer,
                _ => unreachable!(),
            }
        }
    }

    drop(raw);
    session.shutdown()?;
    println!();
    Ok(())
}
